//! Schema introspection
//!
//! Renders the live catalog as model-grounding context. Nothing here is
//! cached: every question sees the database as it is at that moment.

use crate::error::{NlqError, Result};
use rusqlite::Connection;
use std::fmt;
use tracing::{debug, warn};

const CATALOG_QUERY: &str = "SELECT sql FROM sqlite_master WHERE type = 'table'";

/// Table creation statements in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescription {
    tables: Vec<String>,
}

impl SchemaDescription {
    pub fn new(tables: Vec<String>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl fmt::Display for SchemaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tables.join("\n"))
    }
}

/// Read every table definition from the catalog.
pub fn read_schema(conn: &Connection) -> Result<SchemaDescription> {
    let mut stmt = conn
        .prepare(CATALOG_QUERY)
        .map_err(|e| NlqError::SchemaUnavailable(e.to_string()))?;

    let tables = stmt
        .query_map([], |row| row.get::<_, Option<String>>(0))
        .map_err(|e| NlqError::SchemaUnavailable(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| NlqError::SchemaUnavailable(e.to_string()))?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    if tables.is_empty() {
        warn!("Database catalog has no tables; generation will run without schema context");
    } else {
        debug!("Read {} table definitions from catalog", tables.len());
    }

    Ok(SchemaDescription::new(tables))
}
