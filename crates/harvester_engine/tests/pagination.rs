use std::sync::Mutex;

use harvester_core::{
    DriverState, ExhaustReason, HarvestConfig, LinkSet, LinkSink, NavigationStrategy, Session,
};
use harvester_engine::{
    ControlFinder, Document, ElementHandle, HarvestError, Interaction, PaginationDriver, PaginationSettings,
    RevealTrigger, SessionObserver, StaticDocument, StrategyReport,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use url::Url;

mod common;
use common::{fast_config, fast_settings, harvester, strip, strip_page, CATALOG};

const NEXT_BUTTON: &str = r#"<button aria-label="Next">›</button>"#;

fn session() -> Session {
    Session::new(Url::parse(CATALOG).unwrap())
}

fn clicks(doc: &StaticDocument) -> usize {
    doc.interactions()
        .iter()
        .filter(|i| matches!(i, Interaction::Click(_)))
        .count()
}

#[tokio::test]
async fn dry_controls_exhaust_after_threshold_and_fall_through() {
    let doc = StaticDocument::new(strip_page(0..3, NEXT_BUTTON));
    let container = strip(&doc).await;
    let harvester = harvester();
    let settings = fast_settings();
    let mut session = session();
    harvester.harvest(&doc, container, &mut session).await;

    let report = PaginationDriver::new(&doc, &harvester, &settings)
        .run(&mut session, container)
        .await
        .unwrap();

    let controls = &report.strategies[0];
    assert_eq!(controls.strategy, NavigationStrategy::Controls);
    assert_eq!(controls.actions, 5);
    assert_eq!(controls.reason, ExhaustReason::Stagnated);
    assert_eq!(clicks(&doc), 5);

    let order: Vec<NavigationStrategy> = report.strategies.iter().map(|r| r.strategy).collect();
    assert_eq!(order, NavigationStrategy::PRIORITY.to_vec());
    assert_eq!(report.strategies[1].actions, 5);
    assert_eq!(session.state(), DriverState::SessionExhausted);
    assert_eq!(session.link_count(), 3);
}

#[tokio::test]
async fn revealed_links_reset_stagnation() {
    let stages = vec![
        strip_page(0..3, NEXT_BUTTON),
        strip_page(0..6, NEXT_BUTTON),
        strip_page(0..9, NEXT_BUTTON),
    ];
    let doc = StaticDocument::staged(stages, vec![RevealTrigger::Click]);
    let container = strip(&doc).await;
    let harvester = harvester();
    let settings = fast_settings();
    let mut session = session();
    harvester.harvest(&doc, container, &mut session).await;

    let report = PaginationDriver::new(&doc, &harvester, &settings)
        .run(&mut session, container)
        .await
        .unwrap();

    let controls = &report.strategies[0];
    assert_eq!(controls.links_found, 6);
    // Two productive clicks, then five dry ones.
    assert_eq!(controls.actions, 7);
    assert_eq!(doc.stage(), 2);
    assert_eq!(session.link_count(), 9);
}

#[tokio::test]
async fn action_cap_bounds_a_productive_strategy() {
    let stages: Vec<String> = (1..=20).map(|n| strip_page(0..n * 2, "")).collect();
    let doc = StaticDocument::staged(stages, vec![RevealTrigger::Scroll]);
    let container = strip(&doc).await;
    let harvester = harvester();
    let settings = PaginationSettings::from_config(&HarvestConfig {
        action_cap: 4,
        ..fast_config()
    });
    let settings = PaginationSettings {
        control_container: None,
        ..settings
    };
    let mut session = session();

    let report = PaginationDriver::new(&doc, &harvester, &settings)
        .run(&mut session, container)
        .await
        .unwrap();

    let controls = &report.strategies[0];
    assert_eq!(controls.reason, ExhaustReason::Unavailable);
    assert_eq!(controls.actions, 0);

    let scroll = &report.strategies[1];
    assert_eq!(scroll.strategy, NavigationStrategy::Scroll);
    assert_eq!(scroll.reason, ExhaustReason::ActionCap);
    assert_eq!(scroll.actions, 4);
    assert!(report.strategies.iter().all(|r| r.actions <= 4));
}

#[tokio::test]
async fn failing_actions_abandon_the_strategy_early() {
    let doc = StaticDocument::new(strip_page(0..3, ""));
    let harvester = harvester();
    let settings = fast_settings();
    let mut session = session();

    let report = PaginationDriver::new(&doc, &harvester, &settings)
        .run(&mut session, ElementHandle(10_000))
        .await
        .unwrap();

    for strategy in &report.strategies[1..] {
        assert_eq!(strategy.reason, ExhaustReason::FailureTolerance);
        assert_eq!(strategy.actions, 3);
    }
}

#[tokio::test]
async fn cancelled_session_stops_with_links_kept() {
    let doc = StaticDocument::new(strip_page(0..4, NEXT_BUTTON));
    let container = strip(&doc).await;
    let harvester = harvester();
    let settings = fast_settings();
    let mut session = session();
    harvester.harvest(&doc, container, &mut session).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = PaginationDriver::new(&doc, &harvester, &settings)
        .with_cancel(cancel)
        .run(&mut session, container)
        .await;

    assert!(matches!(result, Err(HarvestError::SessionAborted)));
    assert_eq!(session.link_count(), 4);
    assert_eq!(clicks(&doc), 0);
}

#[derive(Default)]
struct Checkpoints {
    seen: Mutex<Vec<(NavigationStrategy, usize)>>,
}

impl SessionObserver for Checkpoints {
    fn strategy_finished(&self, report: &StrategyReport, links: &LinkSet) {
        self.seen.lock().unwrap().push((report.strategy, links.len()));
    }
}

#[tokio::test]
async fn observer_sees_every_finished_strategy() {
    let doc = StaticDocument::new(strip_page(0..2, ""));
    let container = strip(&doc).await;
    let harvester = harvester();
    let settings = fast_settings();
    let mut session = session();
    let observer = Checkpoints::default();

    PaginationDriver::new(&doc, &harvester, &settings)
        .with_observer(&observer)
        .run(&mut session, container)
        .await
        .unwrap();

    let seen = observer.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[0], (NavigationStrategy::Controls, 0));
    // The first scroll pass harvests the two visible links.
    assert_eq!(seen[1], (NavigationStrategy::Scroll, 2));
}

#[tokio::test]
async fn disabled_and_inert_controls_are_ignored() {
    let doc = StaticDocument::new(strip_page(
        0..1,
        r#"<button aria-label="Next" disabled>›</button>
           <button aria-label="More" aria-disabled="true">more</button>
           <div aria-label="Next page">inert</div>
           <span role="button" style="opacity: 0.3" aria-label="Forward">»</span>
           <div role="button" id="live" aria-label="Show more">»</div>"#,
    ));

    let found = ControlFinder::new(None).find(&doc).await;
    assert_eq!(found.len(), 1);
    assert_eq!(doc.attribute(found[0], "id").await.unwrap().as_deref(), Some("live"));
}

#[tokio::test]
async fn page_wide_scan_skips_links_that_leave_the_page() {
    let doc = StaticDocument::new(strip_page(
        0..1,
        r##"<a role="link" href="/about/collection">Learn more</a>
           <a onclick="return false" href="https://elsewhere.example/more">More stories</a>
           <a role="link" id="live" href="#">Show more</a>"##,
    ));

    let found = ControlFinder::new(None).find(&doc).await;
    assert_eq!(found.len(), 1);
    assert_eq!(doc.attribute(found[0], "id").await.unwrap().as_deref(), Some("live"));
}
