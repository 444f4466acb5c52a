#![allow(dead_code)]

use std::sync::Mutex;

use harvester_core::{HarvestConfig, LinkPolicy};
use harvester_engine::{
    Document, ElementHandle, EngineEvent, LinkHarvester, PaginationSettings, ProgressSink, Query,
};
use url::Url;

pub const BASE: &str = "https://target-site.example";
pub const CATALOG: &str = "https://target-site.example/entity/hokusai/m0bwf4?categoryid=artist";

pub fn policy() -> LinkPolicy {
    LinkPolicy::new(Url::parse(BASE).unwrap(), Url::parse(CATALOG).unwrap())
}

pub fn harvester() -> LinkHarvester {
    LinkHarvester::new(policy())
}

/// Short waits so strategy loops finish quickly.
pub fn fast_config() -> HarvestConfig {
    HarvestConfig {
        target_url: CATALOG.to_string(),
        base_url: BASE.to_string(),
        delay_ms: 0,
        settle_delay_ms: 4,
        settle_poll_ms: 1,
        cascade_passes: 1,
        sweep_rounds: 2,
        request_spacing_ms: 0,
        ..HarvestConfig::default()
    }
}

pub fn fast_settings() -> PaginationSettings {
    PaginationSettings {
        control_container: None,
        ..PaginationSettings::from_config(&fast_config())
    }
}

pub fn asset_anchors(range: std::ops::Range<u32>) -> String {
    range
        .map(|i| format!(r#"<a href="/asset/item-{i}/id{i}">Item {i}</a>"#))
        .collect()
}

/// A strip of item links followed by optional extra markup.
pub fn strip_page(links: std::ops::Range<u32>, after: &str) -> String {
    format!(
        r#"<html><head><title>Hokusai</title></head><body><div id="strip">{}</div>{}</body></html>"#,
        asset_anchors(links),
        after
    )
}

pub async fn strip(doc: &dyn Document) -> ElementHandle {
    doc.query(None, &Query::css("#strip")).await.unwrap()[0]
}

pub fn item(i: u32) -> String {
    format!("{BASE}/asset/item-{i}/id{i}")
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<EngineEvent>>,
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}
