use engine_logging::{engine_debug, engine_warn};
use harvester_core::{MetadataField, MetadataRecord};
use scraper::{ElementRef, Html, Selector};

/// Picks which of a page's list blocks holds the item details.
pub trait BlockPolicy: Send + Sync {
    /// Index of the chosen block among `block_count` blocks in document order.
    fn select(&self, block_count: usize) -> Option<usize>;
}

/// Detail lists sit after navigation lists on the reference catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastBlock;

impl BlockPolicy for LastBlock {
    fn select(&self, block_count: usize) -> Option<usize> {
        block_count.checked_sub(1)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstBlock;

impl BlockPolicy for FirstBlock {
    fn select(&self, block_count: usize) -> Option<usize> {
        (block_count > 0).then_some(0)
    }
}

/// What one item page yielded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub fields: Vec<(MetadataField, String)>,
    pub image_url: Option<String>,
    pub block_count: usize,
}

impl PageMetadata {
    /// Copies the recognised fields into `record`. Later entries win.
    pub fn apply(&self, record: &mut MetadataRecord) {
        for (field, value) in &self.fields {
            record.set(*field, value.clone());
        }
    }
}

pub struct MetadataExtractor {
    policy: Box<dyn BlockPolicy>,
    block: Selector,
    entry: Selector,
    og_image: Selector,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(Box::new(LastBlock))
    }
}

impl MetadataExtractor {
    pub fn new(policy: Box<dyn BlockPolicy>) -> Self {
        Self {
            policy,
            block: Selector::parse("ul").expect("valid selector"),
            entry: Selector::parse("li").expect("valid selector"),
            og_image: Selector::parse("meta[property='og:image']").expect("valid selector"),
        }
    }

    pub fn extract(&self, html: &str) -> PageMetadata {
        let doc = Html::parse_document(html);
        let blocks: Vec<ElementRef<'_>> = doc.select(&self.block).collect();
        let image_url = doc
            .select(&self.og_image)
            .find_map(|meta| meta.value().attr("content"))
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let mut page = PageMetadata {
            fields: Vec::new(),
            image_url,
            block_count: blocks.len(),
        };

        let Some(block) = self.policy.select(blocks.len()).and_then(|i| blocks.get(i)) else {
            engine_warn!("No detail list found on item page");
            return page;
        };

        for entry in block.select(&self.entry) {
            let text = collapse_whitespace(&entry.text().collect::<String>());
            let Some((label, value)) = text.split_once(':') else {
                continue;
            };
            match MetadataField::from_page_label(label) {
                Some(field) => page.fields.push((field, value.trim().to_string())),
                None => engine_debug!("Ignoring detail label '{}'", label.trim()),
            }
        }
        page
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_block_policy_reads_the_leading_list() {
        let html = "<ul><li>Medium: Woodblock</li></ul><ul><li>Medium: Ink</li></ul>";
        let page = MetadataExtractor::new(Box::new(FirstBlock)).extract(html);
        assert_eq!(page.fields, vec![(MetadataField::Medium, "Woodblock".to_string())]);
        assert_eq!(page.block_count, 2);
    }

    #[test]
    fn identifying_labels_on_the_page_are_ignored() {
        let html = "<ul><li>Index: 99</li><li>Page URL: x</li><li>Title: Fuji</li></ul>";
        let page = MetadataExtractor::default().extract(html);
        assert_eq!(page.fields, vec![(MetadataField::Title, "Fuji".to_string())]);
    }

    #[test]
    fn policies_handle_empty_pages() {
        assert_eq!(LastBlock.select(0), None);
        assert_eq!(FirstBlock.select(0), None);
        assert_eq!(LastBlock.select(3), Some(2));
    }
}
