//! Harvester engine: drives a live catalog page through the [`Document`]
//! capability, collects item links, and runs the per-item metadata pass.
mod controller;
mod decode;
mod document;
mod export;
mod fetch;
mod filename;
mod harvest;
mod item_pass;
mod locator;
mod metadata;
mod pagination;
mod persist;
mod static_doc;
mod types;

pub use controller::{ConvergenceController, SessionOutcome, SweepReport, SweepSettings};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use document::{Document, DocumentError, ElementHandle, Key, Query, ScriptAction};
pub use export::{
    read_session_record, write_session_outputs, CsvRecordWriter, ExportError, RecordSink,
    SessionFiles, SessionRecord, METADATA_FILENAME,
};
pub use fetch::{FetchSettings, Fetcher, ProgressSink, ReqwestFetcher};
pub use filename::image_filename;
pub use harvest::{
    default_rules as default_link_rules, CandidateLink, HarvestPass, LinkHarvester, LinkRule,
    ReferenceSource,
};
pub use item_pass::{ItemPassReport, ItemPassSettings, MetadataPass};
pub use locator::{
    default_rules as default_container_rules, ContainerLocator, LocatedContainer, LocatorRule,
    KNOWN_CONTAINER_PATH,
};
pub use metadata::{BlockPolicy, FirstBlock, LastBlock, MetadataExtractor, PageMetadata};
pub use pagination::{
    ControlFinder, PaginationDriver, PaginationReport, PaginationSettings, SessionObserver,
    StrategyReport, KNOWN_CONTROL_PATH,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use static_doc::{Interaction, RevealTrigger, StaticDocument};
pub use types::{
    EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, HarvestError, JobId,
    JobProgress, Stage,
};
