use std::collections::HashSet;
use std::fmt;

use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};
use harvester_core::{LinkPolicy, LinkSink};
use regex::Regex;

use crate::document::{Document, DocumentError, ElementHandle, Query};

const DEBUG_SAMPLE: usize = 10;

/// Which attribute of a matched element a reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    Href,
    DataHref,
    InlineHandler,
}

impl fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceSource::Href => "href",
            ReferenceSource::DataHref => "data-href",
            ReferenceSource::InlineHandler => "onclick",
        };
        f.write_str(name)
    }
}

/// A raw reference and where it was found. Not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub reference: String,
    pub rule: String,
    pub source: ReferenceSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRule {
    pub name: String,
    pub query: Query,
}

impl LinkRule {
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        Self {
            name: name.into(),
            query,
        }
    }
}

/// Counts from one harvest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestPass {
    pub elements: usize,
    pub candidates: usize,
    pub rejected: usize,
    pub new_links: usize,
}

/// Extracts item links from a container using an ordered rule list.
#[derive(Debug, Clone)]
pub struct LinkHarvester {
    policy: LinkPolicy,
    rules: Vec<LinkRule>,
    handler_pattern: Regex,
}

impl LinkHarvester {
    pub fn new(policy: LinkPolicy) -> Self {
        let rules = default_rules(&policy);
        Self::with_rules(policy, rules)
    }

    pub fn with_rules(policy: LinkPolicy, rules: Vec<LinkRule>) -> Self {
        let handler_pattern = handler_pattern(policy.item_markers());
        Self {
            policy,
            rules,
            handler_pattern,
        }
    }

    pub fn rules(&self) -> &[LinkRule] {
        &self.rules
    }

    /// Runs every rule and collects raw references. Each element is read once
    /// per pass; its provenance is the first rule that matched it.
    pub async fn collect_candidates(
        &self,
        doc: &dyn Document,
        container: ElementHandle,
    ) -> (usize, Vec<CandidateLink>) {
        let mut seen: HashSet<ElementHandle> = HashSet::new();
        let mut candidates = Vec::new();

        for rule in &self.rules {
            let elements = match doc.query(Some(container), &rule.query).await {
                Ok(elements) => elements,
                Err(err) => {
                    engine_debug!("Link rule '{}' failed: {}", rule.name, err);
                    continue;
                }
            };
            engine_trace!("Link rule '{}' matched {} elements", rule.name, elements.len());

            for element in elements {
                if !seen.insert(element) {
                    continue;
                }
                match self.read_references(doc, element).await {
                    Ok(references) => {
                        candidates.extend(references.into_iter().map(|(source, reference)| {
                            CandidateLink {
                                reference,
                                rule: rule.name.clone(),
                                source,
                            }
                        }));
                    }
                    Err(err) => {
                        engine_debug!("Skipping unreadable element {}: {}", element, err);
                    }
                }
            }
        }

        (seen.len(), candidates)
    }

    /// Validates candidates and inserts them. Returns pass counts; `new_links`
    /// excludes links the sink already knew.
    pub async fn harvest(
        &self,
        doc: &dyn Document,
        container: ElementHandle,
        sink: &mut dyn LinkSink,
    ) -> HarvestPass {
        let (elements, candidates) = self.collect_candidates(doc, container).await;
        let mut pass = HarvestPass {
            elements,
            candidates: candidates.len(),
            ..HarvestPass::default()
        };

        for candidate in &candidates {
            match self.policy.classify(Some(&candidate.reference)) {
                Ok(link) => {
                    if sink.insert_link(link.clone()) {
                        pass.new_links += 1;
                        if sink.link_count() <= 5 {
                            engine_info!("Found link: {} (via {}, {})", link, candidate.rule, candidate.source);
                        }
                    }
                }
                Err(reason) => {
                    pass.rejected += 1;
                    engine_trace!("Rejected {}: {}", candidate.reference, reason);
                }
            }
        }

        if pass.candidates == pass.rejected {
            engine_warn!("No valid item links found in container");
            self.log_raw_links(doc, container).await;
        }
        engine_debug!(
            "Harvest pass: {} elements, {} candidates, {} new, {} total",
            pass.elements,
            pass.candidates,
            pass.new_links,
            sink.link_count()
        );
        pass
    }

    /// Cheap progress signal: anchors in the container matched by the first rule.
    pub async fn visible_count(&self, doc: &dyn Document, container: ElementHandle) -> Option<usize> {
        let rule = self.rules.first()?;
        doc.query(Some(container), &rule.query)
            .await
            .ok()
            .map(|found| found.len())
    }

    async fn read_references(
        &self,
        doc: &dyn Document,
        element: ElementHandle,
    ) -> Result<Vec<(ReferenceSource, String)>, DocumentError> {
        let mut references = Vec::new();
        if let Some(href) = doc.attribute(element, "href").await? {
            references.push((ReferenceSource::Href, href));
        }
        if let Some(data_href) = doc.attribute(element, "data-href").await? {
            references.push((ReferenceSource::DataHref, data_href));
        }
        if let Some(handler) = doc.attribute(element, "onclick").await? {
            references.extend(
                self.handler_references(&handler)
                    .into_iter()
                    .map(|reference| (ReferenceSource::InlineHandler, reference)),
            );
        }
        Ok(references)
    }

    /// Quoted literals inside an inline handler that contain an item marker.
    pub fn handler_references(&self, handler: &str) -> Vec<String> {
        self.handler_pattern
            .captures_iter(handler)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    async fn log_raw_links(&self, doc: &dyn Document, container: ElementHandle) {
        let anchors = match doc.query(Some(container), &Query::css("a[href]")).await {
            Ok(anchors) => anchors,
            Err(err) => {
                engine_debug!("Could not list raw links: {}", err);
                return;
            }
        };
        engine_debug!("All links in container: {}", anchors.len());
        for (i, anchor) in anchors.into_iter().take(DEBUG_SAMPLE).enumerate() {
            let href = doc.attribute(anchor, "href").await.ok().flatten().unwrap_or_default();
            let text: String = doc
                .text(anchor)
                .await
                .unwrap_or_default()
                .chars()
                .take(50)
                .collect();
            engine_debug!("  {}. {} | Text: '{}'", i + 1, href, text);
        }
    }
}

/// Narrow rules first, broad rules last. All of them run on every pass.
pub fn default_rules(policy: &LinkPolicy) -> Vec<LinkRule> {
    let mut rules: Vec<LinkRule> = policy
        .item_markers()
        .iter()
        .map(|marker| {
            LinkRule::new(
                format!("href contains {marker}"),
                Query::css(format!("a[href*='{marker}']")),
            )
        })
        .collect();

    if let Some(host) = policy.base().host_str() {
        rules.push(LinkRule::new(
            "same-site href",
            Query::css(format!("a[href*='{host}']")),
        ));
    }

    let broad = [
        ("tracked anchor", "a[data-ved]"),
        ("data-href", "[data-href]"),
        ("inline handler", "[onclick]"),
        ("button role descendant", "div[role='button'] a"),
        ("tracked block descendant", "div[data-ved] a"),
        ("pointer block descendant", "div[style*='cursor'] a"),
        ("image anchor", "a:has(img)"),
        ("any anchor", "a[href]"),
    ];
    rules.extend(
        broad
            .iter()
            .map(|(name, css)| LinkRule::new(*name, Query::css(*css))),
    );
    rules
}

fn handler_pattern(markers: &[String]) -> Regex {
    let alternatives: Vec<String> = markers
        .iter()
        .map(|marker| regex::escape(marker.trim_matches('/')))
        .filter(|marker| !marker.is_empty())
        .collect();
    let body = if alternatives.is_empty() {
        "[^\"']+".to_string()
    } else {
        format!("[^\"']*(?:{})[^\"']*", alternatives.join("|"))
    };
    Regex::new(&format!("[\"']({body})[\"']")).expect("escaped markers form a valid pattern")
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn harvester() -> LinkHarvester {
        LinkHarvester::new(LinkPolicy::new(
            Url::parse("https://target-site.example").unwrap(),
            Url::parse("https://target-site.example/entity/x").unwrap(),
        ))
    }

    #[test]
    fn handler_literals_with_markers_are_extracted() {
        let found = harvester().handler_references(
            "navigate('/asset/wave/abc'); track(\"click\"); open('/artwork/fuji')",
        );
        assert_eq!(found, vec!["/asset/wave/abc".to_string(), "/artwork/fuji".to_string()]);
    }

    #[test]
    fn narrow_rules_come_before_broad_ones() {
        let harvester = harvester();
        let names: Vec<&str> = harvester.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"href contains /asset/"));
        assert_eq!(names.last(), Some(&"any anchor"));
    }
}
