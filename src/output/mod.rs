//! Record encoders
//!
//! The fetched run list is written either as flattened CSV rows or as a
//! key-sorted, indented JSON document, to stdout or to a file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::Record;

pub mod csv;
pub mod flatten;
pub mod json;

pub use self::csv::CsvRecordsWriter;
pub use self::json::JsonRecordsWriter;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes a complete record set
pub trait RecordsWriter {
    /// Encode and write `records`
    fn write_records(&mut self, records: &[Record]) -> OutputResult<()>;

    /// Flush buffered output
    fn flush(&mut self) -> OutputResult<()>;
}

/// Encoding of the dumped runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Flattened rows
    Csv,
    /// Indented, key-sorted JSON array
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {s}. Valid options: CSV, JSON")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => f.write_str("CSV"),
            OutputFormat::Json => f.write_str("JSON"),
        }
    }
}

/// Where output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Standard output (`-`)
    Stdout,
    /// A file path
    File(PathBuf),
}

impl FromStr for OutputTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("output path cannot be empty".to_string()),
            "-" => Ok(OutputTarget::Stdout),
            path => Ok(OutputTarget::File(PathBuf::from(path))),
        }
    }
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputTarget::Stdout => f.write_str("-"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Encode `records` in `format` to any writer
///
/// # Errors
/// Propagates encoder and IO failures
pub fn write_to<W: Write>(records: &[Record], format: OutputFormat, inner: W) -> OutputResult<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = CsvRecordsWriter::new(inner);
            writer.write_records(records)?;
            writer.flush()
        }
        OutputFormat::Json => {
            let mut writer = JsonRecordsWriter::new(inner);
            writer.write_records(records)?;
            writer.flush()
        }
    }
}

/// Encode `records` in `format` to `target`, creating parent directories as needed
///
/// # Errors
/// Fails if the file cannot be created or encoding fails
pub fn write_records(
    records: &[Record],
    format: OutputFormat,
    target: &OutputTarget,
) -> OutputResult<()> {
    match target {
        OutputTarget::Stdout => {
            let stdout = std::io::stdout();
            write_to(records, format, BufWriter::new(stdout.lock()))
        }
        OutputTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OutputError::IoError(format!("Failed to create directory: {e}"))
                })?;
            }
            let file = File::create(path)
                .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;
            write_to(records, format, BufWriter::new(file))?;
            info!(path = %path.display(), runs = records.len(), %format, "Output written");
            Ok(())
        }
    }
}
