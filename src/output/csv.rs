//! CSV output writer

use csv::Writer;
use std::collections::BTreeSet;
use std::io::Write;
use tracing::info;

use super::flatten::{flatten_record, FlatRecord};
use super::{OutputError, OutputResult, RecordsWriter};
use crate::Record;

/// Writes records as flattened CSV rows.
///
/// The header is the sorted union of every record's flattened columns, so
/// the whole record set is needed before the first row is written.
pub struct CsvRecordsWriter<W: Write> {
    writer: Writer<W>,
    rows_written: u64,
}

impl<W: Write> CsvRecordsWriter<W> {
    /// Wrap `inner`
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::from_writer(inner),
            rows_written: 0,
        }
    }

    /// Rows written so far, excluding the header
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl<W: Write> RecordsWriter for CsvRecordsWriter<W> {
    fn write_records(&mut self, records: &[Record]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let rows: Vec<FlatRecord> = records.iter().map(flatten_record).collect();
        let headers: BTreeSet<&str> = rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();

        info!(
            "Writing a CSV with headers {}",
            headers.iter().copied().collect::<Vec<_>>().join(", ")
        );

        self.writer
            .write_record(headers.iter())
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;

        for row in &rows {
            let cells = headers
                .iter()
                .map(|column| row.get(*column).map(String::as_str).unwrap_or(""));
            self.writer
                .write_record(cells)
                .map_err(|e| OutputError::CsvError(format!("Failed to write row: {e}")))?;
            self.rows_written += 1;
        }

        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(e.to_string()))
    }
}
