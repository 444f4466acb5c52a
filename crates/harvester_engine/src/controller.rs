use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_core::{HarvestConfig, LinkSink, NavigationStrategy, Session, SessionSummary};
use tokio_util::sync::CancellationToken;

use crate::document::{Document, ElementHandle, Key, Query, ScriptAction};
use crate::harvest::LinkHarvester;
use crate::locator::ContainerLocator;
use crate::pagination::{settle, PaginationDriver, PaginationReport, PaginationSettings, SessionObserver};
use crate::types::HarvestError;

const SWEEP_FRACTIONS: [f64; 9] = [0.0, 0.25, 0.5, 0.75, 1.0, 0.75, 0.5, 0.25, 0.0];
const CONSENT_WORDS: [&str; 2] = ["Accept", "OK"];

/// Limits for the final best-effort sweep.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Iterations per direction for key steps and wheel bursts.
    pub rounds: u32,
    pub settle_delay: Duration,
    pub settle_poll: Duration,
    pub wheel_delta_px: i64,
}

impl SweepSettings {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            rounds: config.sweep_rounds,
            settle_delay: config.budget(NavigationStrategy::Keyboard).settle_delay,
            settle_poll: config.settle_poll(),
            wheel_delta_px: config.wheel_delta_px,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub actions: u32,
    pub failures: u32,
    pub new_links: usize,
}

/// Everything a finished session hands to persistence and reporting.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub summary: SessionSummary,
    pub container_rule: String,
    pub initial_links: usize,
    pub pagination: PaginationReport,
    pub sweep: SweepReport,
}

#[derive(Debug, Clone, Copy)]
enum SweepStep {
    Key(Key),
    Script(ScriptAction),
}

/// Runs one catalog session end to end: load, locate, harvest, paginate,
/// sweep, finalize.
pub struct ConvergenceController {
    locator: ContainerLocator,
    harvester: LinkHarvester,
    pagination: PaginationSettings,
    sweep: SweepSettings,
    load_delay: Duration,
    cancel: CancellationToken,
}

impl ConvergenceController {
    pub fn new(
        locator: ContainerLocator,
        harvester: LinkHarvester,
        pagination: PaginationSettings,
        sweep: SweepSettings,
        load_delay: Duration,
    ) -> Self {
        Self {
            locator,
            harvester,
            pagination,
            sweep,
            load_delay,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Result<Self, url::ParseError> {
        Ok(Self::new(
            ContainerLocator::default(),
            LinkHarvester::new(config.link_policy()?),
            PaginationSettings::from_config(config),
            SweepSettings::from_config(config),
            config.delay() * 2,
        ))
    }

    /// Cancelling the token stops the session at the next action; links found
    /// so far are still finalized.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn harvester(&self) -> &LinkHarvester {
        &self.harvester
    }

    pub async fn run(
        &self,
        doc: &dyn Document,
        mut session: Session,
        observer: Option<&dyn SessionObserver>,
    ) -> Result<SessionOutcome, HarvestError> {
        let target = session.target().to_string();
        engine_info!("Loading catalog page {}", target);
        doc.load(&target).await.map_err(HarvestError::InitialLoad)?;
        tokio::time::sleep(self.load_delay).await;
        self.dismiss_consent(doc).await;
        self.log_diagnostics(doc).await;

        let container = self.locator.locate_or_body(doc).await?;
        if container.degraded {
            session.mark_degraded_container();
        }
        engine_info!("Using container {} from '{}'", container.element, container.rule);

        let pass = self
            .harvester
            .harvest(doc, container.element, &mut session)
            .await;
        let initial_links = pass.new_links;
        engine_info!("Initial pass found {} links", initial_links);

        let mut outcome = SessionOutcome {
            summary: SessionSummary {
                source_url: target,
                total_links: 0,
                newly_discovered: 0,
                links: Vec::new(),
                degraded_container: container.degraded,
                aborted: false,
            },
            container_rule: container.rule.clone(),
            initial_links,
            pagination: PaginationReport::default(),
            sweep: SweepReport::default(),
        };

        let aborted = match self
            .paginate_and_sweep(doc, &mut session, container.element, observer, &mut outcome)
            .await
        {
            Ok(()) => false,
            Err(HarvestError::SessionAborted) => {
                engine_warn!(
                    "Session aborted; finalizing {} links discovered so far",
                    session.link_count()
                );
                true
            }
            Err(err) => {
                engine_warn!("Session step failed: {}; finalizing", err);
                false
            }
        };

        outcome.summary = session.finalize(aborted);
        engine_info!(
            "Session finished with {} unique item links",
            outcome.summary.total_links
        );
        Ok(outcome)
    }

    async fn paginate_and_sweep(
        &self,
        doc: &dyn Document,
        session: &mut Session,
        container: ElementHandle,
        observer: Option<&dyn SessionObserver>,
        outcome: &mut SessionOutcome,
    ) -> Result<(), HarvestError> {
        let mut driver = PaginationDriver::new(doc, &self.harvester, &self.pagination)
            .with_cancel(self.cancel.clone());
        if let Some(observer) = observer {
            driver = driver.with_observer(observer);
        }
        outcome.pagination = driver.run(session, container).await?;

        outcome.sweep = self.comprehensive_sweep(doc, session, container).await?;

        let pass = self.harvester.harvest(doc, container, session).await;
        engine_info!("Final pass added {} links", pass.new_links);
        Ok(())
    }

    /// Key steps both ways, wheel bursts both ways, then fractional scroll
    /// revisits. Bounded; individual failures are skipped.
    pub async fn comprehensive_sweep(
        &self,
        doc: &dyn Document,
        session: &mut Session,
        container: ElementHandle,
    ) -> Result<SweepReport, HarvestError> {
        let rounds = self.sweep.rounds as usize;
        let delta = self.sweep.wheel_delta_px;
        let mut steps = Vec::with_capacity(rounds * 4 + SWEEP_FRACTIONS.len());
        steps.extend(std::iter::repeat(SweepStep::Key(Key::ArrowRight)).take(rounds));
        steps.extend(std::iter::repeat(SweepStep::Key(Key::ArrowLeft)).take(rounds));
        steps.extend(
            std::iter::repeat(SweepStep::Script(ScriptAction::Wheel { dx: delta, dy: delta }))
                .take(rounds),
        );
        steps.extend(
            std::iter::repeat(SweepStep::Script(ScriptAction::Wheel {
                dx: -delta,
                dy: -delta,
            }))
            .take(rounds),
        );
        steps.extend(
            SWEEP_FRACTIONS
                .iter()
                .map(|f| SweepStep::Script(ScriptAction::ScrollToFraction(*f))),
        );

        engine_info!("Comprehensive sweep: {} steps", steps.len());
        let mut report = SweepReport::default();
        for step in steps {
            if self.cancel.is_cancelled() {
                return Err(HarvestError::SessionAborted);
            }
            report.actions += 1;
            let before = self
                .harvester
                .visible_count(doc, container)
                .await
                .unwrap_or(0);
            let result = match step {
                SweepStep::Key(key) => doc.press_key(container, key).await,
                SweepStep::Script(action) => doc.execute(container, &action).await,
            };
            if let Err(err) = result {
                engine_debug!("Sweep step {:?} failed: {}", step, err);
                report.failures += 1;
                continue;
            }
            settle(
                doc,
                &self.harvester,
                container,
                before,
                self.sweep.settle_delay,
                self.sweep.settle_poll,
            )
            .await;
            report.new_links += self.harvester.harvest(doc, container, session).await.new_links;
        }

        engine_info!(
            "Sweep done: {} actions, {} failed, {} new links",
            report.actions,
            report.failures,
            report.new_links
        );
        Ok(report)
    }

    async fn dismiss_consent(&self, doc: &dyn Document) {
        let buttons = match doc.query(None, &Query::css("button")).await {
            Ok(buttons) => buttons,
            Err(_) => return,
        };
        for button in buttons {
            let text = doc.text(button).await.unwrap_or_default();
            if CONSENT_WORDS.iter().any(|word| text.contains(word)) {
                match doc.click(button).await {
                    Ok(()) => {
                        engine_info!("Dismissed consent prompt '{}'", text);
                        tokio::time::sleep(self.load_delay / 4).await;
                    }
                    Err(err) => engine_debug!("Consent click failed: {}", err),
                }
                return;
            }
        }
    }

    async fn log_diagnostics(&self, doc: &dyn Document) {
        if let Ok(title) = doc.title().await {
            engine_info!("Page title: {}", title);
        }
        engine_info!("Total divs on page: {}", count_matches(doc, "div").await);
        engine_info!("Total links on page: {}", count_matches(doc, "a").await);

        let item_rule = self.harvester.rules().first().map(|rule| rule.query.clone());
        let item_links = match &item_rule {
            Some(query) => doc.query(None, query).await.unwrap_or_default(),
            None => Vec::new(),
        };
        engine_info!("Item-like links on page: {}", item_links.len());
        for (i, link) in item_links.iter().take(3).enumerate() {
            let href = doc.attribute(*link, "href").await.ok().flatten().unwrap_or_default();
            engine_info!("  {}. {}", i + 1, href);
        }

        let body_text = match doc.query(None, &Query::css("body")).await {
            Ok(found) => match found.first() {
                Some(body) => doc.text(*body).await.unwrap_or_default(),
                None => String::new(),
            },
            Err(_) => String::new(),
        };
        if item_links.is_empty() || body_text.to_lowercase().contains("loading") {
            engine_warn!("Page might still be loading or need interaction");
        }
    }
}

async fn count_matches(doc: &dyn Document, css: &str) -> usize {
    doc.query(None, &Query::css(css))
        .await
        .map(|found| found.len())
        .unwrap_or(0)
}
