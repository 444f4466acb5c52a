use async_trait::async_trait;
use harvester_core::Session;
use harvester_engine::{
    ConvergenceController, Document, DocumentError, ElementHandle, HarvestError, Interaction, Key,
    Query, RevealTrigger, ScriptAction, StaticDocument,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use url::Url;

mod common;
use common::{asset_anchors, fast_config, item, CATALOG};

fn controller() -> ConvergenceController {
    ConvergenceController::from_config(&fast_config()).unwrap()
}

fn session() -> Session {
    Session::new(Url::parse(CATALOG).unwrap())
}

fn carousel_page(links: std::ops::Range<u32>) -> String {
    format!(
        r#"<html><head><title>Katsushika Hokusai</title></head><body>
<div id="strip" style="overflow-x: auto">{}</div>
<button aria-label="Next">›</button>
</body></html>"#,
        asset_anchors(links)
    )
}

/// A browser that never reaches the catalog.
struct Unreachable;

#[async_trait]
impl Document for Unreachable {
    async fn load(&self, url: &str) -> Result<(), DocumentError> {
        Err(DocumentError::Load {
            url: url.to_string(),
            message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })
    }
    async fn title(&self) -> Result<String, DocumentError> {
        Ok(String::new())
    }
    async fn query(
        &self,
        _scope: Option<ElementHandle>,
        _query: &Query,
    ) -> Result<Vec<ElementHandle>, DocumentError> {
        Ok(Vec::new())
    }
    async fn attribute(
        &self,
        element: ElementHandle,
        _name: &str,
    ) -> Result<Option<String>, DocumentError> {
        Err(DocumentError::StaleElement(element))
    }
    async fn text(&self, element: ElementHandle) -> Result<String, DocumentError> {
        Err(DocumentError::StaleElement(element))
    }
    async fn tag_name(&self, element: ElementHandle) -> Result<String, DocumentError> {
        Err(DocumentError::StaleElement(element))
    }
    async fn style(
        &self,
        element: ElementHandle,
        _property: &str,
    ) -> Result<Option<String>, DocumentError> {
        Err(DocumentError::StaleElement(element))
    }
    async fn execute(
        &self,
        element: ElementHandle,
        _action: &ScriptAction,
    ) -> Result<(), DocumentError> {
        Err(DocumentError::StaleElement(element))
    }
    async fn click(&self, element: ElementHandle) -> Result<(), DocumentError> {
        Err(DocumentError::StaleElement(element))
    }
    async fn press_key(&self, element: ElementHandle, _key: Key) -> Result<(), DocumentError> {
        Err(DocumentError::StaleElement(element))
    }
}

#[tokio::test]
async fn initial_load_failure_is_fatal() {
    let result = controller().run(&Unreachable, session(), None).await;
    assert!(matches!(
        result,
        Err(HarvestError::InitialLoad(DocumentError::Load { .. }))
    ));
}

#[tokio::test]
async fn session_converges_over_revealed_snapshots() {
    let doc = StaticDocument::staged(
        vec![carousel_page(0..3), carousel_page(0..6), carousel_page(0..9)],
        vec![RevealTrigger::Click],
    );

    let outcome = controller().run(&doc, session(), None).await.unwrap();

    assert_eq!(outcome.container_rule, "css div[style*='overflow-x']");
    assert_eq!(outcome.initial_links, 3);
    assert_eq!(outcome.pagination.links_found(), 6);
    assert_eq!(outcome.summary.total_links, 9);
    assert!(!outcome.summary.degraded_container);
    assert!(!outcome.summary.aborted);

    let mut expected: Vec<String> = (0..9).map(item).collect();
    expected.sort();
    assert_eq!(outcome.summary.links, expected);

    // Two key directions and two wheel directions of two rounds, then nine
    // fractional scroll positions.
    assert_eq!(outcome.sweep.actions, 17);
    assert_eq!(outcome.sweep.failures, 0);
}

#[tokio::test]
async fn links_outside_any_block_use_the_body() {
    let doc = StaticDocument::new(format!(
        "<html><body><p>{}</p></body></html>",
        asset_anchors(0..4)
    ));

    let outcome = controller().run(&doc, session(), None).await.unwrap();

    assert!(outcome.summary.degraded_container);
    assert_eq!(outcome.container_rule, "document body");
    assert_eq!(outcome.summary.total_links, 4);
}

#[tokio::test]
async fn abort_still_finalizes_discovered_links() {
    let doc = StaticDocument::new(carousel_page(0..5));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = controller()
        .with_cancel(cancel)
        .run(&doc, session(), None)
        .await
        .unwrap();

    assert!(outcome.summary.aborted);
    assert_eq!(outcome.summary.total_links, 5);
    assert_eq!(outcome.sweep.actions, 0);
}

#[tokio::test]
async fn consent_prompt_is_dismissed_after_load() {
    let doc = StaticDocument::new(format!(
        r#"<html><body><div id="consent"><button>Accept all</button></div>{}</body></html>"#,
        carousel_page(0..2)
    ));

    controller().run(&doc, session(), None).await.unwrap();

    let interactions = doc.interactions();
    assert_eq!(interactions[0], Interaction::Load(CATALOG.to_string()));
    let consent = doc.query(None, &Query::css("#consent button")).await.unwrap()[0];
    assert_eq!(interactions[1], Interaction::Click(consent));
}

#[tokio::test]
async fn seeded_links_are_not_counted_as_new() {
    let doc = StaticDocument::new(carousel_page(0..4));
    let seed = [item(0), item(1)].into_iter().collect();
    let session = Session::with_seed(Url::parse(CATALOG).unwrap(), seed);

    let outcome = controller().run(&doc, session, None).await.unwrap();

    assert_eq!(outcome.summary.total_links, 4);
    assert_eq!(outcome.summary.newly_discovered, 2);
}
