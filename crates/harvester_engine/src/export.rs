use std::fs::{self, File};
use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use harvester_core::{metadata_header, MetadataRecord, SessionSummary};
use serde::{Deserialize, Serialize};

use crate::persist::{ensure_output_dir, AtomicFileWriter, PersistError};

const LISTING_RULE_WIDTH: usize = 50;
pub const METADATA_FILENAME: &str = "metadata.csv";

/// The session output document, `<stem>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub total_links: usize,
    pub scrape_timestamp: String,
    pub source_url: String,
    pub links: Vec<String>,
}

impl SessionRecord {
    pub fn from_summary(summary: &SessionSummary, scrape_timestamp: impl Into<String>) -> Self {
        Self {
            total_links: summary.links.len(),
            scrape_timestamp: scrape_timestamp.into(),
            source_url: summary.source_url.clone(),
            links: summary.links.clone(),
        }
    }

    /// Numbered human-readable listing, `<stem>.txt`.
    pub fn render_listing(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Catalog Links - Total: {}\n", self.total_links));
        out.push_str(&format!("Scraped on: {}\n", self.scrape_timestamp));
        out.push_str(&"=".repeat(LISTING_RULE_WIDTH));
        out.push_str("\n\n");
        for (i, link) in self.links.iter().enumerate() {
            out.push_str(&format!("{:3}. {}\n", i + 1, link));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    pub json_path: PathBuf,
    pub listing_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub fn write_session_outputs(
    output_dir: &Path,
    stem: &str,
    record: &SessionRecord,
) -> Result<SessionFiles, ExportError> {
    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    let json = serde_json::to_string_pretty(record)?;
    let json_path = writer.write(&format!("{stem}.json"), &json)?;
    let listing_path = writer.write(&format!("{stem}.txt"), &record.render_listing())?;
    engine_info!(
        "Saved {} links to {} and {}",
        record.total_links,
        json_path.display(),
        listing_path.display()
    );
    Ok(SessionFiles {
        json_path,
        listing_path,
    })
}

/// Reads a previously written `<stem>.json` back into its record.
pub fn read_session_record(path: &Path) -> Result<SessionRecord, ExportError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Receives metadata rows in item order.
pub trait RecordSink {
    fn write_record(&mut self, record: &MetadataRecord) -> Result<(), ExportError>;
}

impl RecordSink for Vec<MetadataRecord> {
    fn write_record(&mut self, record: &MetadataRecord) -> Result<(), ExportError> {
        self.push(record.clone());
        Ok(())
    }
}

/// CSV sink with the fixed metadata header. Each row is flushed as written so
/// an interrupted pass keeps the rows it produced.
pub struct CsvRecordWriter<W: std::io::Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvRecordWriter<File> {
    pub fn create(output_dir: &Path) -> Result<Self, ExportError> {
        ensure_output_dir(output_dir)?;
        let file = File::create(output_dir.join(METADATA_FILENAME))?;
        Self::new(file)
    }
}

impl<W: std::io::Write> CsvRecordWriter<W> {
    pub fn new(inner: W) -> Result<Self, ExportError> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(metadata_header())?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W, ExportError> {
        self.writer
            .into_inner()
            .map_err(|err| ExportError::Io(err.into_error()))
    }
}

impl<W: std::io::Write> RecordSink for CsvRecordWriter<W> {
    fn write_record(&mut self, record: &MetadataRecord) -> Result<(), ExportError> {
        self.writer.write_record(record.row())?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}
