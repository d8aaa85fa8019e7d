//! Query Result - rows materialized for display

use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;

/// One result row: column name to value, in engine column order.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names as reported by the engine
    pub columns: Vec<String>,

    pub rows: Vec<Row>,

    /// Number of rows returned (after any cap)
    pub row_count: usize,

    /// True when the row cap cut the result short
    pub truncated: bool,

    pub execution_time_ms: u64,

    /// Engine that executed the query
    pub engine_name: String,
}

impl QueryResult {
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Row>,
        truncated: bool,
        engine_name: &str,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            columns,
            row_count: rows.len(),
            rows,
            truncated,
            execution_time_ms,
            engine_name: engine_name.to_string(),
        }
    }
}

/// Convert a SQLite value to JSON. Blobs become lowercase hex text.
pub fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2);
            for byte in bytes {
                let _ = write!(hex, "{:02x}", byte);
            }
            Value::String(hex)
        }
    }
}
