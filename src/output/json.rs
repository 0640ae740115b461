//! JSON output writer

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::io::Write;

use super::{OutputError, OutputResult, RecordsWriter};
use crate::Record;

/// Writes records as one indented JSON array with keys sorted at every level.
pub struct JsonRecordsWriter<W: Write> {
    inner: W,
}

impl<W: Write> JsonRecordsWriter<W> {
    /// Wrap `inner`
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> RecordsWriter for JsonRecordsWriter<W> {
    fn write_records(&mut self, records: &[Record]) -> OutputResult<()> {
        let sorted: Vec<Value> = records.iter().map(sort_keys).collect();

        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut self.inner, formatter);
        sorted
            .serialize(&mut serializer)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;

        self.inner
            .write_all(b"\n")
            .map_err(|e| OutputError::IoError(e.to_string()))
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.inner
            .flush()
            .map_err(|e| OutputError::FlushError(e.to_string()))
    }
}

/// Copy of `value` with every object's keys in sorted order
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        scalar => scalar.clone(),
    }
}
