use engine_logging::{engine_debug, engine_trace};
use harvester_engine::{EngineEvent, ProgressSink, Stage};

/// Forwards metadata-pass events to the log.
pub(crate) struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::Progress(progress) => {
                if progress.stage != Stage::Downloading {
                    engine_trace!("Item {} -> {:?}", progress.job_id, progress.stage);
                }
            }
            EngineEvent::ItemCompleted { job_id, url, result } => match result {
                Ok(()) => engine_debug!("Item {} done: {}", job_id, url),
                Err(kind) => engine_debug!("Item {} degraded ({}): {}", job_id, kind, url),
            },
        }
    }
}
