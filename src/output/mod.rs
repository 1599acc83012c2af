//! Output module for harvested page records
//!
//! This module handles:
//! - Encoding page records as JSON (one object per record)
//! - Encoding page records as a flat CSV table
//! - Recording and printing crawl statistics

mod json;
pub mod stats;
mod tabular;

pub use json::write_json;
pub use stats::{print_statistics, CrawlStatistics};
pub use tabular::{tabular_columns, write_csv};

use crate::crawler::PageRecord;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Supported output encodings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON array, one object per page record
    #[default]
    Json,
    /// Flat table whose columns are the union of all record keys
    Csv,
}

impl OutputFormat {
    /// Guesses the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Csv => f.write_str("csv"),
        }
    }
}

/// Serializes page records to a byte stream in the given format
pub fn write_records<W: Write>(
    records: &[PageRecord],
    format: OutputFormat,
    writer: W,
) -> OutputResult<()> {
    match format {
        OutputFormat::Json => write_json(records, writer),
        OutputFormat::Csv => write_csv(records, writer),
    }
}

/// Writes page records to a file, replacing any existing content
pub fn write_records_to_path(
    records: &[PageRecord],
    format: OutputFormat,
    path: &Path,
) -> OutputResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_records(records, format, &mut writer)?;
    writer.flush()?;
    Ok(())
}
