use std::fs;
use std::path::{Path, PathBuf};

use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_core::{HarvestConfig, LinkSet};
use harvester_engine::{ensure_output_dir, AtomicFileWriter, SessionObserver, StrategyReport};
use serde::{Deserialize, Serialize};

const CHECKPOINT_FILENAME: &str = ".harvester_checkpoint.ron";

/// Reads `harvester.ron`. A missing file means defaults; a broken one is
/// reported and also falls back to defaults.
pub(crate) fn load_config(path: &Path) -> HarvestConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return HarvestConfig::default();
        }
        Err(err) => {
            eprintln!("Warning: could not read {:?}: {}", path, err);
            return HarvestConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Warning: could not parse {:?}: {}", path, err);
            HarvestConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedCheckpoint {
    source_url: String,
    links: Vec<String>,
}

/// Links saved by an interrupted run against the same catalog page.
pub(crate) fn load_checkpoint(output_dir: &Path, source_url: &str) -> LinkSet {
    let path = output_dir.join(CHECKPOINT_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return LinkSet::new();
        }
        Err(err) => {
            engine_warn!("Failed to read checkpoint from {:?}: {}", path, err);
            return LinkSet::new();
        }
    };

    let checkpoint: PersistedCheckpoint = match ron::from_str(&content) {
        Ok(checkpoint) => checkpoint,
        Err(err) => {
            engine_warn!("Failed to parse checkpoint from {:?}: {}", path, err);
            return LinkSet::new();
        }
    };
    if checkpoint.source_url != source_url {
        engine_info!("Ignoring checkpoint for a different catalog ({})", checkpoint.source_url);
        return LinkSet::new();
    }

    engine_info!(
        "Resuming with {} links from {:?}",
        checkpoint.links.len(),
        path
    );
    checkpoint.links.into_iter().collect()
}

pub(crate) fn save_checkpoint(output_dir: &Path, source_url: &str, links: &LinkSet) {
    if let Err(err) = ensure_output_dir(output_dir) {
        engine_error!("Failed to ensure output dir {:?}: {}", output_dir, err);
        return;
    }

    let checkpoint = PersistedCheckpoint {
        source_url: source_url.to_string(),
        links: links.to_sorted_vec(),
    };
    let content = match ron::ser::to_string_pretty(&checkpoint, ron::ser::PrettyConfig::new()) {
        Ok(text) => text,
        Err(err) => {
            engine_error!("Failed to serialize checkpoint: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(PathBuf::from(output_dir));
    if let Err(err) = writer.write(CHECKPOINT_FILENAME, &content) {
        engine_error!("Failed to write checkpoint to {:?}: {}", output_dir, err);
    }
}

pub(crate) fn clear_checkpoint(output_dir: &Path) {
    let path = output_dir.join(CHECKPOINT_FILENAME);
    match fs::remove_file(&path) {
        Ok(()) => engine_info!("Cleared checkpoint {:?}", path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => engine_warn!("Failed to clear checkpoint {:?}: {}", path, err),
    }
}

/// Saves the discovered set whenever a pagination strategy finishes.
pub(crate) struct Checkpointer {
    output_dir: PathBuf,
    source_url: String,
}

impl Checkpointer {
    pub(crate) fn new(output_dir: PathBuf, source_url: impl Into<String>) -> Self {
        Self {
            output_dir,
            source_url: source_url.into(),
        }
    }
}

impl SessionObserver for Checkpointer {
    fn strategy_finished(&self, report: &StrategyReport, links: &LinkSet) {
        save_checkpoint(&self.output_dir, &self.source_url, links);
        engine_info!(
            "Checkpoint after '{}': {} links",
            report.strategy,
            links.len()
        );
    }
}
