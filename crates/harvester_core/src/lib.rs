//! Harvester core: session state, link validation and the pagination
//! strategy state machine. No IO.
mod config;
mod link_set;
mod metadata;
mod session;
mod strategy;
mod validate;

pub use config::{HarvestConfig, DEFAULT_BASE_URL, DEFAULT_TARGET_URL};
pub use link_set::LinkSet;
pub use metadata::{metadata_header, MetadataField, MetadataRecord};
pub use session::{Coverage, LinkSink, Session, SessionSummary};
pub use strategy::{
    AdvanceOutcome, DriverState, ExhaustReason, NavigationStrategy, StrategyBudget,
    StrategyTracker,
};
pub use validate::{LinkPolicy, Rejection, DEFAULT_DENIED_SEGMENTS, DEFAULT_ITEM_MARKERS};
