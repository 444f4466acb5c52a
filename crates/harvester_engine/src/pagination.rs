use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_core::{
    AdvanceOutcome, DriverState, ExhaustReason, HarvestConfig, LinkSet, LinkSink,
    NavigationStrategy, Session, StrategyBudget, StrategyTracker,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::document::{Document, DocumentError, ElementHandle, Key, Query, ScriptAction};
use crate::harvest::LinkHarvester;
use crate::types::HarvestError;

/// Where the reference catalog keeps its carousel arrows.
pub const KNOWN_CONTROL_PATH: &str =
    "/html/body/div[3]/div/div[3]/div[2]/div/div[2]/span[1]/div/div/div[2]";

const CONTROL_CANDIDATES: &str =
    "button, [role='button'], [aria-label], [jsaction], [onclick], [style*='cursor']";
const ADVANCE_WORDS: &[&str] = &["next", "more", "forward", "›", "→", "»"];
const MIN_OPACITY: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub budgets: [StrategyBudget; 4],
    pub scroll_increment_px: i64,
    pub wheel_delta_px: i64,
    pub settle_poll: Duration,
    pub cascade_passes: u32,
    pub control_container: Option<Query>,
}

impl PaginationSettings {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            budgets: NavigationStrategy::PRIORITY.map(|strategy| config.budget(strategy)),
            scroll_increment_px: config.scroll_increment_px,
            wheel_delta_px: config.wheel_delta_px,
            settle_poll: config.settle_poll(),
            cascade_passes: config.cascade_passes,
            control_container: Some(Query::path(KNOWN_CONTROL_PATH)),
        }
    }

    pub fn budget(&self, strategy: NavigationStrategy) -> StrategyBudget {
        let position = NavigationStrategy::PRIORITY
            .iter()
            .position(|s| *s == strategy)
            .unwrap_or(0);
        self.budgets[position]
    }
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self::from_config(&HarvestConfig::default())
    }
}

/// Called as each strategy finishes, e.g. to checkpoint the discovered set.
pub trait SessionObserver: Send + Sync {
    fn strategy_finished(&self, report: &StrategyReport, links: &LinkSet);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyReport {
    pub strategy: NavigationStrategy,
    pub actions: u32,
    pub links_found: usize,
    pub reason: ExhaustReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationReport {
    pub strategies: Vec<StrategyReport>,
    pub cascade_passes: u32,
}

impl PaginationReport {
    pub fn links_found(&self) -> usize {
        self.strategies.iter().map(|r| r.links_found).sum()
    }
}

/// Finds enabled "advance" controls: first inside the known control strip,
/// then anywhere on the page by role, handler and cursor signals.
#[derive(Debug, Clone, Default)]
pub struct ControlFinder {
    container: Option<Query>,
}

impl ControlFinder {
    pub fn new(container: Option<Query>) -> Self {
        Self { container }
    }

    /// Enabled controls, best first.
    pub async fn find(&self, doc: &dyn Document) -> Vec<ElementHandle> {
        if let Some(query) = &self.container {
            if let Some(strip) = doc.query(None, query).await.ok().and_then(|f| f.first().copied()) {
                let controls = self.usable_controls(doc, Some(strip)).await;
                if !controls.is_empty() {
                    // Arrow strips put "next" last when nothing is labelled.
                    let labelled: Vec<ElementHandle> = controls
                        .iter()
                        .filter(|(_, label)| names_advance(label))
                        .map(|(element, _)| *element)
                        .collect();
                    if !labelled.is_empty() {
                        return labelled;
                    }
                    return controls.last().map(|(element, _)| vec![*element]).unwrap_or_default();
                }
            }
        }

        let mut controls = Vec::new();
        for (element, label) in self.usable_controls(doc, None).await {
            if !names_advance(&label) {
                continue;
            }
            match navigates_away(doc, element).await {
                Ok(false) => controls.push(element),
                Ok(true) => engine_debug!("Skipping navigating link {} ({})", element, label),
                Err(err) => engine_debug!("Skipping control {}: {}", element, err),
            }
        }
        controls
    }

    async fn usable_controls(
        &self,
        doc: &dyn Document,
        scope: Option<ElementHandle>,
    ) -> Vec<(ElementHandle, String)> {
        let candidates = match doc.query(scope, &Query::css(CONTROL_CANDIDATES)).await {
            Ok(found) => found,
            Err(err) => {
                engine_debug!("Control scan failed: {}", err);
                return Vec::new();
            }
        };

        let mut usable = Vec::new();
        for element in candidates {
            match inspect_control(doc, element).await {
                Ok(Some(label)) => usable.push((element, label)),
                Ok(None) => {}
                Err(err) => engine_debug!("Skipping control {}: {}", element, err),
            }
        }
        usable
    }
}

/// Returns the lowercased label of an interactive, enabled control.
async fn inspect_control(
    doc: &dyn Document,
    element: ElementHandle,
) -> Result<Option<String>, DocumentError> {
    let tag = doc.tag_name(element).await?;
    let role = doc.attribute(element, "role").await?.unwrap_or_default();
    let has_handler = doc.attribute(element, "onclick").await?.is_some()
        || doc.attribute(element, "jsaction").await?.is_some();
    let pointer = doc
        .style(element, "cursor")
        .await?
        .is_some_and(|cursor| cursor.trim().eq_ignore_ascii_case("pointer"));
    let interactive = tag == "button"
        || role.eq_ignore_ascii_case("button")
        || role.eq_ignore_ascii_case("link")
        || has_handler
        || pointer;
    if !interactive {
        return Ok(None);
    }

    let disabled = doc.attribute(element, "disabled").await?.is_some()
        || doc
            .attribute(element, "aria-disabled")
            .await?
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
        || doc
            .attribute(element, "class")
            .await?
            .is_some_and(|class| class.split_whitespace().any(|c| c.eq_ignore_ascii_case("disabled")))
        || doc
            .style(element, "opacity")
            .await?
            .and_then(|opacity| opacity.trim().parse::<f64>().ok())
            .is_some_and(|opacity| opacity < MIN_OPACITY);
    if disabled {
        return Ok(None);
    }

    let label = match doc.attribute(element, "aria-label").await? {
        Some(label) if !label.trim().is_empty() => label,
        _ => match doc.attribute(element, "title").await? {
            Some(title) if !title.trim().is_empty() => title,
            _ => doc.text(element).await?,
        },
    };
    Ok(Some(label.to_lowercase()))
}

/// Anchors whose href leaves the page, such as "Learn more" links.
async fn navigates_away(doc: &dyn Document, element: ElementHandle) -> Result<bool, DocumentError> {
    if doc.tag_name(element).await? != "a" {
        return Ok(false);
    }
    let Some(href) = doc.attribute(element, "href").await? else {
        return Ok(false);
    };
    let href = href.trim();
    Ok(!(href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:")))
}

fn names_advance(label: &str) -> bool {
    ADVANCE_WORDS.iter().any(|word| label.contains(word))
}

/// Waits for lazily-loaded content: returns once the visible link count has
/// grown and then held steady for one poll, or when `max` has elapsed.
pub(crate) async fn settle(
    doc: &dyn Document,
    harvester: &LinkHarvester,
    container: ElementHandle,
    before: usize,
    max: Duration,
    poll: Duration,
) {
    let deadline = Instant::now() + max;
    let mut last = before;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
        let count = harvester.visible_count(doc, container).await.unwrap_or(last);
        if count != before && count == last {
            return;
        }
        last = count;
    }
}

/// Advances the visible window through the strategy cascade until every
/// strategy is exhausted.
pub struct PaginationDriver<'a> {
    doc: &'a dyn Document,
    harvester: &'a LinkHarvester,
    settings: &'a PaginationSettings,
    controls: ControlFinder,
    cancel: CancellationToken,
    observer: Option<&'a dyn SessionObserver>,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        doc: &'a dyn Document,
        harvester: &'a LinkHarvester,
        settings: &'a PaginationSettings,
    ) -> Self {
        Self {
            doc,
            harvester,
            settings,
            controls: ControlFinder::new(settings.control_container.clone()),
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn SessionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs the cascade. Links found before an abort stay in `session`.
    pub async fn run(
        &self,
        session: &mut Session,
        container: ElementHandle,
    ) -> Result<PaginationReport, HarvestError> {
        let mut report = PaginationReport::default();

        for _ in 0..self.settings.cascade_passes.max(1) {
            report.cascade_passes += 1;
            let mut last_found = 0;
            for strategy in NavigationStrategy::PRIORITY {
                let strategy_report = self.run_strategy(strategy, session, container).await?;
                last_found = strategy_report.links_found;
                if let Some(observer) = self.observer {
                    observer.strategy_finished(&strategy_report, session.discovered());
                }
                report.strategies.push(strategy_report);
            }
            if last_found == 0 {
                break;
            }
            engine_info!("Last strategy still produced links; repeating the cascade");
        }

        session.set_state(DriverState::SessionExhausted);
        engine_info!(
            "Pagination converged after {} pass(es): {} links",
            report.cascade_passes,
            session.link_count()
        );
        Ok(report)
    }

    async fn run_strategy(
        &self,
        strategy: NavigationStrategy,
        session: &mut Session,
        container: ElementHandle,
    ) -> Result<StrategyReport, HarvestError> {
        let budget = self.settings.budget(strategy);
        let mut tracker = StrategyTracker::new(strategy, budget);
        session.set_state(strategy.advancing_state());
        engine_info!(
            "Strategy '{}' starting with {} links",
            strategy,
            session.link_count()
        );

        if strategy == NavigationStrategy::Controls && self.controls.find(self.doc).await.is_empty() {
            engine_info!("No enabled advance controls found");
            tracker.mark_unavailable();
        }

        let mut step = 0;
        while tracker.can_advance() {
            if self.cancel.is_cancelled() {
                return Err(HarvestError::SessionAborted);
            }

            let before = self
                .harvester
                .visible_count(self.doc, container)
                .await
                .unwrap_or(0);
            let outcome = match self.advance(strategy, container, step).await {
                Ok(()) => {
                    settle(
                        self.doc,
                        self.harvester,
                        container,
                        before,
                        budget.settle_delay,
                        self.settings.settle_poll,
                    )
                    .await;
                    let pass = self.harvester.harvest(self.doc, container, &mut *session).await;
                    if pass.new_links > 0 {
                        engine_debug!("'{}' step {} added {} links", strategy, step, pass.new_links);
                        AdvanceOutcome::NewLinks(pass.new_links)
                    } else {
                        AdvanceOutcome::NoNewLinks
                    }
                }
                Err(err) => {
                    engine_debug!("'{}' step {} failed: {}", strategy, step, err);
                    AdvanceOutcome::ActionFailed
                }
            };
            step += 1;

            let exhausted = tracker.record(outcome);
            session.set_stagnation(strategy, tracker.stagnation());
            if exhausted.is_some() {
                break;
            }
        }

        let reason = tracker.exhausted().unwrap_or(ExhaustReason::ActionCap);
        if reason == ExhaustReason::FailureTolerance {
            engine_warn!("Strategy '{}' abandoned after repeated failures", strategy);
        }
        engine_info!(
            "Strategy '{}' exhausted ({}): {} actions, {} new links, {} total",
            strategy,
            reason,
            tracker.actions(),
            tracker.links_found(),
            session.link_count()
        );
        session.set_state(DriverState::StrategyExhausted(strategy));

        Ok(StrategyReport {
            strategy,
            actions: tracker.actions(),
            links_found: tracker.links_found(),
            reason,
        })
    }

    async fn advance(
        &self,
        strategy: NavigationStrategy,
        container: ElementHandle,
        step: u32,
    ) -> Result<(), DocumentError> {
        match strategy {
            NavigationStrategy::Controls => {
                let control = self
                    .controls
                    .find(self.doc)
                    .await
                    .first()
                    .copied()
                    .ok_or_else(|| DocumentError::ActionFailed("no enabled control".into()))?;
                self.doc.click(control).await
            }
            NavigationStrategy::Scroll => {
                let px = self.settings.scroll_increment_px;
                self.doc
                    .execute(container, &ScriptAction::ScrollBy { dx: px, dy: px })
                    .await
            }
            NavigationStrategy::Keyboard => {
                let key = if step % 2 == 0 {
                    Key::ArrowRight
                } else {
                    Key::PageDown
                };
                self.doc.press_key(container, key).await
            }
            NavigationStrategy::Wheel => {
                let delta = self.settings.wheel_delta_px;
                self.doc
                    .execute(container, &ScriptAction::Wheel { dx: delta, dy: delta })
                    .await
            }
        }
    }
}
