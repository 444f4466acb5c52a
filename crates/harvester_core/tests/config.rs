use harvester_core::{HarvestConfig, NavigationStrategy};
use pretty_assertions::assert_eq;

#[test]
fn partial_ron_config_keeps_defaults() {
    engine_logging::initialize_for_tests();
    let config: HarvestConfig =
        ron::from_str("(headless: false, delay_ms: 500, stagnation_threshold: 8)").unwrap();

    assert!(!config.headless);
    assert_eq!(config.delay_ms, 500);
    assert_eq!(config.stagnation_threshold, 8);
    assert_eq!(config.action_cap, HarvestConfig::default().action_cap);
}

#[test]
fn key_and_wheel_budgets_settle_faster() {
    let config = HarvestConfig::default();
    let scroll = config.budget(NavigationStrategy::Scroll);
    let wheel = config.budget(NavigationStrategy::Wheel);
    assert_eq!(scroll.settle_delay, config.settle_delay());
    assert_eq!(wheel.settle_delay * 2, config.settle_delay());
    assert_eq!(scroll.stagnation_threshold, 5);
    assert_eq!(scroll.action_cap, 50);
}

#[test]
fn default_policy_accepts_catalog_items() {
    let policy = HarvestConfig::default().link_policy().unwrap();
    assert!(policy.is_valid_item_link(Some("/asset/the-great-wave/abc123")));
    assert!(!policy.is_valid_item_link(Some(
        "https://artsandculture.google.com/entity/hokusai/m0bwf4?categoryid=artist"
    )));
}
