use std::collections::BTreeMap;

use url::Url;

use crate::{DriverState, LinkSet, NavigationStrategy};

/// Narrow write access to a discovered-link set.
pub trait LinkSink {
    /// Inserts a normalized link, returning `true` if it was new.
    fn insert_link(&mut self, link: String) -> bool;
    fn contains_link(&self, link: &str) -> bool;
    fn link_count(&self) -> usize;
}

impl LinkSink for LinkSet {
    fn insert_link(&mut self, link: String) -> bool {
        self.insert(link)
    }

    fn contains_link(&self, link: &str) -> bool {
        self.contains(link)
    }

    fn link_count(&self) -> usize {
        self.len()
    }
}

/// One harvesting run against one catalog page.
#[derive(Debug, Clone)]
pub struct Session {
    target: Url,
    discovered: LinkSet,
    seeded: usize,
    state: DriverState,
    stagnation: BTreeMap<NavigationStrategy, u32>,
    degraded_container: bool,
}

impl Session {
    pub fn new(target: Url) -> Self {
        Self::with_seed(target, LinkSet::new())
    }

    /// Starts a session from links recovered from an earlier, interrupted run.
    pub fn with_seed(target: Url, seed: LinkSet) -> Self {
        Self {
            target,
            seeded: seed.len(),
            discovered: seed,
            state: DriverState::Idle,
            stagnation: BTreeMap::new(),
            degraded_container: false,
        }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn discovered(&self) -> &LinkSet {
        &self.discovered
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn set_state(&mut self, state: DriverState) {
        self.state = state;
    }

    pub fn stagnation(&self, strategy: NavigationStrategy) -> u32 {
        self.stagnation.get(&strategy).copied().unwrap_or(0)
    }

    pub fn set_stagnation(&mut self, strategy: NavigationStrategy, count: u32) {
        self.stagnation.insert(strategy, count);
    }

    pub fn mark_degraded_container(&mut self) {
        self.degraded_container = true;
    }

    pub fn degraded_container(&self) -> bool {
        self.degraded_container
    }

    pub fn finalize(self, aborted: bool) -> SessionSummary {
        SessionSummary {
            source_url: self.target.to_string(),
            total_links: self.discovered.len(),
            newly_discovered: self.discovered.len() - self.seeded,
            links: self.discovered.to_sorted_vec(),
            degraded_container: self.degraded_container,
            aborted,
        }
    }
}

impl LinkSink for Session {
    fn insert_link(&mut self, link: String) -> bool {
        self.discovered.insert(link)
    }

    fn contains_link(&self, link: &str) -> bool {
        self.discovered.contains(link)
    }

    fn link_count(&self) -> usize {
        self.discovered.len()
    }
}

/// Closing state of a finished (or aborted) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub source_url: String,
    pub total_links: usize,
    /// Links found in this run, excluding any restored seed.
    pub newly_discovered: usize,
    /// Sorted.
    pub links: Vec<String>,
    pub degraded_container: bool,
    pub aborted: bool,
}

impl SessionSummary {
    /// Human-readable comparison against an externally known item count.
    pub fn coverage(&self, expected_total: usize) -> Coverage {
        if self.total_links > expected_total {
            Coverage::Extra(self.total_links - expected_total)
        } else if expected_total == 0 {
            Coverage::Percent(100.0)
        } else {
            Coverage::Percent(self.total_links as f64 / expected_total as f64 * 100.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coverage {
    Percent(f64),
    Extra(usize),
}
