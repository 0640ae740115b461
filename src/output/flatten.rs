//! Flattening of nested records into tabular cells
//!
//! Map keys and list indices are joined with `_` under their parent's name:
//! `{"times": {"primary_t": 12.5}, "players": [{"id": "x"}]}` becomes
//! `times_primary_t = 12.5` and `players_0_id = x`. Empty maps and lists
//! produce no cells.

use serde_json::Value;
use std::collections::BTreeMap;

/// Nesting depth past which a subtree is written as compact JSON in one cell
pub const MAX_FLATTEN_DEPTH: usize = 64;

/// Flattened record: column name to cell text, sorted by column name
pub type FlatRecord = BTreeMap<String, String>;

/// Flatten one record
pub fn flatten_record(record: &Value) -> FlatRecord {
    let mut cells = FlatRecord::new();
    let mut stack: Vec<(String, &Value, usize)> = vec![(String::new(), record, 0)];

    while let Some((path, value, depth)) = stack.pop() {
        match value {
            Value::Object(map) if depth < MAX_FLATTEN_DEPTH => {
                for (key, child) in map.iter().rev() {
                    stack.push((join(&path, key), child, depth + 1));
                }
            }
            Value::Array(items) if depth < MAX_FLATTEN_DEPTH => {
                for (index, child) in items.iter().enumerate().rev() {
                    stack.push((join(&path, &index.to_string()), child, depth + 1));
                }
            }
            scalar => {
                cells.insert(path, cell_text(scalar));
            }
        }
    }

    cells
}

/// Text written to a CSV cell for a scalar value
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Only reached past the depth cap
        nested => nested.to_string(),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}_{key}")
    }
}
