use harvester_core::{MetadataField, MetadataRecord};
use harvester_engine::{BlockPolicy, MetadataExtractor};
use pretty_assertions::assert_eq;

const ITEM_PAGE: &str = r#"<html><head>
<meta property="og:image" content="https://lh3.img.example/ci/AbCdEf=s1200">
</head><body>
<ul class="nav"><li>Home</li><li>Creator: Wrong block</li></ul>
<ul class="related"><li>Medium: Also wrong</li></ul>
<ul class="details">
  <li><span>Title:</span>   The Great Wave off Kanagawa </li>
  <li>Creator:
      Hokusai</li>
  <li>Date Created: 1830/1833</li>
  <li>Physical Dimensions: 25.7 x 37.9 cm</li>
  <li>Credit Line: H. O. Havemeyer Collection, 1929</li>
  <li>External Link: https://museum.example/collection/45434</li>
  <li>Just a sentence without a separator</li>
</ul>
</body></html>"#;

#[test]
fn last_of_three_blocks_is_used_and_values_are_trimmed() {
    let page = MetadataExtractor::default().extract(ITEM_PAGE);
    let mut record = MetadataRecord::for_item(1, "https://target-site.example/asset/wave/AAA");
    page.apply(&mut record);

    assert_eq!(page.block_count, 3);
    assert_eq!(record.get(MetadataField::Creator), "Hokusai");
    assert_eq!(record.get(MetadataField::Title), "The Great Wave off Kanagawa");
    assert_eq!(record.get(MetadataField::DateCreated), "1830/1833");
    assert_eq!(record.get(MetadataField::PhysicalDimensions), "25.7 x 37.9 cm");
    assert_eq!(record.get(MetadataField::Medium), "");
    assert_eq!(record.get(MetadataField::Index), "1");
    assert_eq!(record.row().len(), MetadataField::ALL.len());
}

#[test]
fn only_the_first_separator_splits() {
    let page = MetadataExtractor::default().extract(
        "<ul><li>Chronology: Edo period: late</li><li>Full Title: Fine Wind, Clear Morning</li></ul>",
    );
    assert_eq!(
        page.fields,
        vec![
            (MetadataField::Chronology, "Edo period: late".to_string()),
            (MetadataField::FullTitle, "Fine Wind, Clear Morning".to_string()),
        ]
    );
}

#[test]
fn og_image_is_reported() {
    let page = MetadataExtractor::default().extract(ITEM_PAGE);
    assert_eq!(
        page.image_url.as_deref(),
        Some("https://lh3.img.example/ci/AbCdEf=s1200")
    );
}

#[test]
fn page_without_lists_leaves_every_field_empty() {
    let page = MetadataExtractor::default().extract("<html><body><p>Not found</p></body></html>");
    let mut record = MetadataRecord::for_item(3, "https://target-site.example/asset/x/1");
    page.apply(&mut record);

    assert_eq!(page.block_count, 0);
    assert_eq!(record.populated_descriptive(), 0);
    assert_eq!(record.get(MetadataField::PageUrl), "https://target-site.example/asset/x/1");
}

struct SecondBlock;

impl BlockPolicy for SecondBlock {
    fn select(&self, block_count: usize) -> Option<usize> {
        (block_count >= 2).then_some(1)
    }
}

#[test]
fn block_policy_is_swappable() {
    let page = MetadataExtractor::new(Box::new(SecondBlock)).extract(ITEM_PAGE);
    assert_eq!(page.fields, vec![(MetadataField::Medium, "Also wrong".to_string())]);
}
