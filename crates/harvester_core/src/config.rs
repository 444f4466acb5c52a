use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{LinkPolicy, NavigationStrategy, StrategyBudget};

pub const DEFAULT_TARGET_URL: &str =
    "https://artsandculture.google.com/entity/hokusai/m0bwf4?categoryid=artist";
pub const DEFAULT_BASE_URL: &str = "https://artsandculture.google.com";

/// Settings for one harvesting run. Every tuning constant is exposed here
/// because the defaults were tuned against a single catalog site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub target_url: String,
    pub base_url: String,
    /// Run without a visible browser window.
    pub headless: bool,
    /// Browser executable; auto-detected when unset.
    pub browser_path: Option<String>,
    /// Upper bound on the initial page navigation.
    pub navigation_timeout_ms: u64,
    /// Base pause between steps (page load waits are multiples of it).
    pub delay_ms: u64,
    /// Upper bound on the wait after each pagination action.
    pub settle_delay_ms: u64,
    /// How often link counts are sampled while waiting for content to settle.
    pub settle_poll_ms: u64,
    pub stagnation_threshold: u32,
    pub action_cap: u32,
    pub failure_tolerance: u32,
    /// Full passes over the strategy cascade; another pass only runs while the
    /// last strategy of the previous pass still found links.
    pub cascade_passes: u32,
    /// Iterations per technique in the final comprehensive sweep.
    pub sweep_rounds: u32,
    pub scroll_increment_px: i64,
    pub wheel_delta_px: i64,
    /// Externally known number of items, used only for the closing report.
    pub expected_total: Option<usize>,
    /// Spacing between outbound item-page requests.
    pub request_spacing_ms: u64,
    pub request_timeout_ms: u64,
    pub download_images: bool,
    pub output_dir: String,
    /// File stem for the session link outputs (`<stem>.json`, `<stem>.txt`).
    pub output_stem: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            headless: true,
            browser_path: None,
            navigation_timeout_ms: 60_000,
            delay_ms: 2_000,
            settle_delay_ms: 2_500,
            settle_poll_ms: 250,
            stagnation_threshold: 5,
            action_cap: 50,
            failure_tolerance: 3,
            cascade_passes: 2,
            sweep_rounds: 10,
            scroll_increment_px: 800,
            wheel_delta_px: 600,
            expected_total: Some(955),
            request_spacing_ms: 1_000,
            request_timeout_ms: 10_000,
            download_images: false,
            output_dir: "output".to_string(),
            output_stem: "catalog_links".to_string(),
        }
    }
}

impl HarvestConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn settle_poll(&self) -> Duration {
        Duration::from_millis(self.settle_poll_ms.max(1))
    }

    pub fn request_spacing(&self) -> Duration {
        Duration::from_millis(self.request_spacing_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Budget for a strategy. Key and wheel steps reveal less per action than a
    /// click or a scroll jump, so they get half the settle time.
    pub fn budget(&self, strategy: NavigationStrategy) -> StrategyBudget {
        let settle_delay = match strategy {
            NavigationStrategy::Controls | NavigationStrategy::Scroll => self.settle_delay(),
            NavigationStrategy::Keyboard | NavigationStrategy::Wheel => self.settle_delay() / 2,
        };
        StrategyBudget {
            stagnation_threshold: self.stagnation_threshold,
            action_cap: self.action_cap,
            failure_tolerance: self.failure_tolerance,
            settle_delay,
        }
    }

    pub fn target(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.target_url)
    }

    pub fn link_policy(&self) -> Result<LinkPolicy, url::ParseError> {
        Ok(LinkPolicy::new(Url::parse(&self.base_url)?, self.target()?))
    }
}
