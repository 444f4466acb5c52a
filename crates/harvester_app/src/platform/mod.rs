//! Process wiring for the harvester binary: configuration, logging, the
//! Chromium-backed document, checkpoints and output files.
mod app;
mod chromium;
mod persistence;
mod progress;

pub use app::run_app;
