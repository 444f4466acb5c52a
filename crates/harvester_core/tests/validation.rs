use harvester_core::{LinkPolicy, Rejection};
use pretty_assertions::assert_eq;
use url::Url;

fn policy() -> LinkPolicy {
    LinkPolicy::new(
        Url::parse("https://target-site.example").unwrap(),
        Url::parse("https://target-site.example/entity/hokusai/m0bwf4?categoryid=artist").unwrap(),
    )
}

#[test]
fn rejects_null_empty_utility_and_foreign_references() {
    let policy = policy();
    for reference in [
        None,
        Some(""),
        Some("/search?x=1"),
        Some("https://other-site.example/asset/9"),
    ] {
        assert!(
            !policy.is_valid_item_link(reference),
            "expected rejection for {reference:?}"
        );
    }
}

#[test]
fn accepts_absolute_and_relative_item_links() {
    let policy = policy();
    assert!(policy.is_valid_item_link(Some("https://target-site.example/asset/123")));
    assert!(policy.is_valid_item_link(Some("/asset/123")));
    assert_eq!(
        policy.normalize(Some("/asset/123")),
        Some("https://target-site.example/asset/123".to_string())
    );
}

#[test]
fn catalog_root_and_denylisted_segments_are_rejected() {
    let policy = policy().with_item_markers(["/asset/", "/entity/"]);
    assert_eq!(
        policy.classify(Some("/entity/hokusai/m0bwf4?categoryid=artist")),
        Err(Rejection::CatalogRoot)
    );
    assert_eq!(
        policy.classify(Some("/explore/asset/9")),
        Err(Rejection::Denylisted("explore".to_string()))
    );
}

#[test]
fn artwork_marker_is_accepted_by_default() {
    assert!(policy().is_valid_item_link(Some("/artwork/the-great-wave")));
}

#[test]
fn custom_denylist_replaces_defaults() {
    let policy = policy().with_denied_segments(["collections"]);
    assert!(policy.is_valid_item_link(Some("/story/asset/1")));
    assert!(!policy.is_valid_item_link(Some("/collections/asset/1")));
}
