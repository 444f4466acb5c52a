use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::document::{Document, ElementHandle, Query};
use crate::types::HarvestError;

/// Last known-good path of the collection strip on the reference catalog.
pub const KNOWN_CONTAINER_PATH: &str =
    "/html/body/div[3]/div/div[3]/div[2]/div/div[2]/span[1]/div/div/div[3]";

/// One step of the container cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorRule {
    /// Accept the first element the query returns.
    First { name: String, query: Query },
    /// Among all candidates, take the one containing the most item links.
    /// Ties go to the first candidate in document order.
    MostItemLinks {
        name: String,
        candidates: Query,
        links: Query,
    },
}

impl LocatorRule {
    pub fn first(name: impl Into<String>, query: Query) -> Self {
        LocatorRule::First {
            name: name.into(),
            query,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LocatorRule::First { name, .. } | LocatorRule::MostItemLinks { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedContainer {
    pub element: ElementHandle,
    /// Name of the rule that produced the container.
    pub rule: String,
    /// Set when no rule matched and the whole document body is used.
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct ContainerLocator {
    rules: Vec<LocatorRule>,
}

impl Default for ContainerLocator {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

/// The reference catalog's cascade: exact path, its ancestors, style and
/// attribute heuristics, then the most-links scan.
pub fn default_rules() -> Vec<LocatorRule> {
    let mut rules = vec![LocatorRule::first("known path", Query::path(KNOWN_CONTAINER_PATH))];

    let parents = [
        "/html/body/div[3]/div/div[3]/div[2]/div/div[2]/span[1]/div/div",
        "/html/body/div[3]/div/div[3]/div[2]/div/div[2]/span[1]/div",
        "/html/body/div[3]/div/div[3]/div[2]/div/div[2]",
        "/html/body/div[3]/div/div[3]/div[2]/div",
    ];
    rules.extend(
        parents
            .iter()
            .enumerate()
            .map(|(i, path)| LocatorRule::first(format!("ancestor path {}", i + 1), Query::path(*path))),
    );

    let heuristics = [
        "div[role='main'] div[style*='overflow']",
        "div[style*='scroll']",
        "[data-ved] div[style*='overflow']",
        "div[style*='overflow-x']",
        "span[role='presentation'] div",
        "div[data-ved] div[style*='width']",
        "div[class*='entity'] div[style*='scroll']",
    ];
    rules.extend(
        heuristics
            .iter()
            .map(|css| LocatorRule::first(format!("css {css}"), Query::css(*css))),
    );

    rules.push(LocatorRule::MostItemLinks {
        name: "most item links".to_string(),
        candidates: Query::css("div"),
        links: Query::css("a[href*='asset']"),
    });
    rules
}

impl ContainerLocator {
    pub fn new(rules: Vec<LocatorRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[LocatorRule] {
        &self.rules
    }

    /// Runs the cascade. Lookup errors skip the rule.
    pub async fn locate(&self, doc: &dyn Document) -> Result<LocatedContainer, HarvestError> {
        for rule in &self.rules {
            engine_debug!("Trying container rule '{}'", rule.name());
            let found = match rule {
                LocatorRule::First { query, .. } => match doc.query(None, query).await {
                    Ok(found) => found.first().copied(),
                    Err(err) => {
                        engine_debug!("Container rule '{}' failed: {}", rule.name(), err);
                        None
                    }
                },
                LocatorRule::MostItemLinks {
                    candidates, links, ..
                } => most_item_links(doc, candidates, links).await,
            };

            if let Some(element) = found {
                engine_info!("Found collection container via '{}'", rule.name());
                return Ok(LocatedContainer {
                    element,
                    rule: rule.name().to_string(),
                    degraded: false,
                });
            }
        }
        Err(HarvestError::ContainerNotFound)
    }

    /// Like [`locate`](Self::locate), but falls back to the document body.
    /// Only fails when the body itself cannot be found.
    pub async fn locate_or_body(
        &self,
        doc: &dyn Document,
    ) -> Result<LocatedContainer, HarvestError> {
        match self.locate(doc).await {
            Ok(found) => Ok(found),
            Err(HarvestError::ContainerNotFound) => {
                engine_warn!("No container rule matched; scanning the whole document");
                let body = doc
                    .query(None, &Query::css("body"))
                    .await?
                    .first()
                    .copied()
                    .ok_or(HarvestError::ContainerNotFound)?;
                Ok(LocatedContainer {
                    element: body,
                    rule: "document body".to_string(),
                    degraded: true,
                })
            }
            Err(err) => Err(err),
        }
    }
}

async fn most_item_links(
    doc: &dyn Document,
    candidates: &Query,
    links: &Query,
) -> Option<ElementHandle> {
    let candidates = match doc.query(None, candidates).await {
        Ok(found) => found,
        Err(err) => {
            engine_debug!("Candidate scan failed: {}", err);
            return None;
        }
    };

    let mut best: Option<(ElementHandle, usize)> = None;
    for candidate in candidates {
        let count = match doc.query(Some(candidate), links).await {
            Ok(found) => found.len(),
            Err(_) => continue,
        };
        if count == 0 {
            continue;
        }
        if best.map_or(true, |(_, max)| count > max) {
            best = Some((candidate, count));
        }
    }

    if let Some((_, count)) = best {
        engine_info!("Best candidate holds {} item links", count);
    }
    best.map(|(element, _)| element)
}
