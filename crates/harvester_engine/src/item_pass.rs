use std::path::PathBuf;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_core::{HarvestConfig, MetadataField, MetadataRecord};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::decode::decode_html;
use crate::export::{ExportError, RecordSink};
use crate::fetch::{Fetcher, ProgressSink};
use crate::filename::image_filename;
use crate::metadata::MetadataExtractor;
use crate::persist::AtomicFileWriter;
use crate::types::{EngineEvent, FailureKind, JobId, JobProgress, Stage};

#[derive(Debug, Clone)]
pub struct ItemPassSettings {
    /// Pause between consecutive item requests.
    pub request_spacing: Duration,
    /// Where preview images go; `None` skips downloads.
    pub image_dir: Option<PathBuf>,
}

impl ItemPassSettings {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            request_spacing: config.request_spacing(),
            image_dir: config
                .download_images
                .then(|| PathBuf::from(&config.output_dir).join("images")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemPassReport {
    pub items: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub images_saved: usize,
    pub cancelled: bool,
}

/// Visits every discovered item page in order and writes one metadata row
/// per item. A failed item still produces a row with its index and URL.
pub struct MetadataPass<'a> {
    pages: &'a dyn Fetcher,
    images: &'a dyn Fetcher,
    extractor: &'a MetadataExtractor,
    settings: ItemPassSettings,
    cancel: CancellationToken,
}

impl<'a> MetadataPass<'a> {
    pub fn new(
        pages: &'a dyn Fetcher,
        images: &'a dyn Fetcher,
        extractor: &'a MetadataExtractor,
        settings: ItemPassSettings,
    ) -> Self {
        Self {
            pages,
            images,
            extractor,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sink errors stop the pass; fetch and parse errors only degrade the row.
    pub async fn run(
        &self,
        links: &[String],
        sink: &mut dyn RecordSink,
        progress: &dyn ProgressSink,
    ) -> Result<ItemPassReport, ExportError> {
        let mut report = ItemPassReport::default();
        engine_info!("Collecting metadata for {} items", links.len());

        for (position, url) in links.iter().enumerate() {
            if self.cancel.is_cancelled() {
                engine_warn!("Metadata pass cancelled after {} items", report.items);
                report.cancelled = true;
                break;
            }
            if position > 0 && !self.settings.request_spacing.is_zero() {
                tokio::time::sleep(self.settings.request_spacing).await;
            }

            let index = position + 1;
            let job_id = index as JobId;
            emit_stage(progress, job_id, Stage::Queued, None);

            let mut record = MetadataRecord::for_item(index, url);
            let result = self.collect(job_id, index, url, &mut record, progress).await;
            match &result {
                Ok(saved_image) => {
                    report.succeeded += 1;
                    if *saved_image {
                        report.images_saved += 1;
                    }
                    engine_info!(
                        "[{}/{}] {} ({} fields)",
                        index,
                        links.len(),
                        url,
                        record.populated_descriptive()
                    );
                }
                Err(kind) => {
                    report.failed += 1;
                    engine_warn!("[{}/{}] {} failed: {}", index, links.len(), url, kind);
                }
            }

            emit_stage(progress, job_id, Stage::Writing, None);
            sink.write_record(&record)?;
            report.items += 1;

            emit_stage(progress, job_id, Stage::Done, None);
            progress.emit(EngineEvent::ItemCompleted {
                job_id,
                url: url.clone(),
                result: result.map(|_| ()),
            });
        }

        engine_info!(
            "Metadata pass done: {} items, {} ok, {} failed, {} images",
            report.items,
            report.succeeded,
            report.failed,
            report.images_saved
        );
        Ok(report)
    }

    /// Fills `record` from the item page. Returns whether an image was saved.
    async fn collect(
        &self,
        job_id: JobId,
        index: usize,
        url: &str,
        record: &mut MetadataRecord,
        progress: &dyn ProgressSink,
    ) -> Result<bool, FailureKind> {
        let fetched = self
            .pages
            .fetch(job_id, url, progress)
            .await
            .map_err(|err| err.kind)?;

        emit_stage(progress, job_id, Stage::Decoding, Some(fetched.metadata.byte_len));
        let decoded = decode_html(&fetched.bytes, fetched.metadata.content_type.as_deref())
            .map_err(|err| {
                engine_debug!("Decode failed for {}: {}", url, err);
                FailureKind::Decode
            })?;

        emit_stage(progress, job_id, Stage::Extracting, None);
        let page = self.extractor.extract(&decoded.html);
        page.apply(record);

        let (Some(image_dir), Some(image_url)) = (&self.settings.image_dir, &page.image_url) else {
            return Ok(false);
        };
        let image_url = match Url::parse(&fetched.metadata.final_url)
            .and_then(|base| base.join(image_url))
        {
            Ok(resolved) => resolved.to_string(),
            Err(err) => {
                engine_debug!("Unusable image reference {}: {}", image_url, err);
                return Ok(false);
            }
        };

        let filename = image_filename(index, &image_url);
        match self.images.fetch(job_id, &image_url, progress).await {
            Ok(image) => {
                let writer = AtomicFileWriter::new(image_dir.clone());
                match writer.write_bytes(&filename, &image.bytes) {
                    Ok(path) => {
                        engine_debug!("Saved image {}", path.display());
                        record.set(MetadataField::ImageFilename, filename);
                        Ok(true)
                    }
                    Err(err) => {
                        engine_warn!("Could not save image {}: {}", filename, err);
                        Ok(false)
                    }
                }
            }
            Err(err) => {
                engine_warn!("Image download failed for {}: {}", url, err);
                Ok(false)
            }
        }
    }
}

fn emit_stage(progress: &dyn ProgressSink, job_id: JobId, stage: Stage, bytes: Option<u64>) {
    progress.emit(EngineEvent::Progress(JobProgress {
        job_id,
        stage,
        bytes,
    }));
}
