use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A way of revealing more of the catalog, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NavigationStrategy {
    /// Click explicit "next"/"more" controls.
    Controls,
    /// Move the container's scroll offset by a fixed increment.
    Scroll,
    /// Send arrow/page key presses to the container.
    Keyboard,
    /// Dispatch synthetic wheel events over the container.
    Wheel,
}

impl NavigationStrategy {
    pub const PRIORITY: [NavigationStrategy; 4] = [
        NavigationStrategy::Controls,
        NavigationStrategy::Scroll,
        NavigationStrategy::Keyboard,
        NavigationStrategy::Wheel,
    ];

    pub fn advancing_state(self) -> DriverState {
        match self {
            NavigationStrategy::Controls => DriverState::AdvancingViaControls,
            NavigationStrategy::Scroll => DriverState::AdvancingViaScroll,
            NavigationStrategy::Keyboard => DriverState::AdvancingViaKeyboard,
            NavigationStrategy::Wheel => DriverState::AdvancingViaWheel,
        }
    }
}

impl fmt::Display for NavigationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavigationStrategy::Controls => "controls",
            NavigationStrategy::Scroll => "scroll",
            NavigationStrategy::Keyboard => "keyboard",
            NavigationStrategy::Wheel => "wheel",
        };
        f.write_str(name)
    }
}

/// Pagination driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    Idle,
    AdvancingViaControls,
    AdvancingViaScroll,
    AdvancingViaKeyboard,
    AdvancingViaWheel,
    StrategyExhausted(NavigationStrategy),
    SessionExhausted,
}

/// Effort limits for a single strategy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyBudget {
    /// Consecutive non-productive advances before the strategy is exhausted.
    pub stagnation_threshold: u32,
    /// Hard cap on advance actions, productive or not.
    pub action_cap: u32,
    /// Consecutive failed actions tolerated before the strategy is abandoned.
    pub failure_tolerance: u32,
    /// Upper bound on the wait after each advance.
    pub settle_delay: Duration,
}

impl Default for StrategyBudget {
    fn default() -> Self {
        Self {
            stagnation_threshold: 5,
            action_cap: 50,
            failure_tolerance: 3,
            settle_delay: Duration::from_millis(2_500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    NewLinks(usize),
    NoNewLinks,
    ActionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    Stagnated,
    ActionCap,
    FailureTolerance,
    /// The strategy had nothing to act on (e.g. no controls on the page).
    Unavailable,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustReason::Stagnated => write!(f, "stagnated"),
            ExhaustReason::ActionCap => write!(f, "action cap reached"),
            ExhaustReason::FailureTolerance => write!(f, "too many failed actions"),
            ExhaustReason::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Bookkeeping for one strategy: counts actions and decides exhaustion.
#[derive(Debug, Clone)]
pub struct StrategyTracker {
    strategy: NavigationStrategy,
    budget: StrategyBudget,
    actions: u32,
    stagnation: u32,
    consecutive_failures: u32,
    links_found: usize,
    exhausted: Option<ExhaustReason>,
}

impl StrategyTracker {
    pub fn new(strategy: NavigationStrategy, budget: StrategyBudget) -> Self {
        Self {
            strategy,
            budget,
            actions: 0,
            stagnation: 0,
            consecutive_failures: 0,
            links_found: 0,
            exhausted: None,
        }
    }

    pub fn strategy(&self) -> NavigationStrategy {
        self.strategy
    }

    pub fn budget(&self) -> &StrategyBudget {
        &self.budget
    }

    pub fn actions(&self) -> u32 {
        self.actions
    }

    pub fn stagnation(&self) -> u32 {
        self.stagnation
    }

    pub fn links_found(&self) -> usize {
        self.links_found
    }

    pub fn exhausted(&self) -> Option<ExhaustReason> {
        self.exhausted
    }

    pub fn can_advance(&self) -> bool {
        self.exhausted.is_none() && self.actions < self.budget.action_cap
    }

    pub fn mark_unavailable(&mut self) {
        self.exhausted.get_or_insert(ExhaustReason::Unavailable);
    }

    /// Records the result of one advance action and returns the exhaustion
    /// reason if this action exhausted the strategy.
    pub fn record(&mut self, outcome: AdvanceOutcome) -> Option<ExhaustReason> {
        if self.exhausted.is_some() {
            return self.exhausted;
        }
        self.actions += 1;

        match outcome {
            AdvanceOutcome::NewLinks(0) | AdvanceOutcome::NoNewLinks => {
                self.stagnation += 1;
                self.consecutive_failures = 0;
            }
            AdvanceOutcome::NewLinks(count) => {
                self.stagnation = 0;
                self.consecutive_failures = 0;
                self.links_found += count;
            }
            AdvanceOutcome::ActionFailed => {
                self.stagnation += 1;
                self.consecutive_failures += 1;
            }
        }

        let reason = if self.consecutive_failures >= self.budget.failure_tolerance.max(1) {
            Some(ExhaustReason::FailureTolerance)
        } else if self.stagnation >= self.budget.stagnation_threshold.max(1) {
            Some(ExhaustReason::Stagnated)
        } else if self.actions >= self.budget.action_cap {
            Some(ExhaustReason::ActionCap)
        } else {
            None
        };
        self.exhausted = reason;
        reason
    }
}
