//! SQLite Execution Engine
//!
//! Every call opens its own read-only connection with `query_only` set, so
//! nothing is shared between requests and no connection outlives the step
//! that needs it. Blocking work runs on the tokio blocking pool.

use crate::error::{NlqError, Result};
use crate::execution::engine::{ExecutionContext, ExecutionEngine};
use crate::execution::result::{value_to_json, QueryResult, Row};
use crate::extract::CandidateSql;
use crate::schema::{read_schema, SchemaDescription};
use async_trait::async_trait;
use rusqlite::{Batch, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const ENGINE_NAME: &str = "sqlite";
const MULTIPLE_STATEMENTS: &str = "You can only execute one statement at a time.";

#[derive(Debug, Clone)]
pub struct SqliteEngine {
    path: PathBuf,
}

impl SqliteEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Open without create or write access.
fn open_read_only(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.execute_batch("PRAGMA query_only = ON")?;
    Ok(conn)
}

fn run_query(path: &Path, sql: &str, row_limit: Option<usize>) -> Result<QueryResult> {
    let started = Instant::now();
    let conn = open_read_only(path)?;

    // Trailing semicolons, whitespace and comments are not statements
    let mut batch = Batch::new(&conn, sql);
    let mut stmt = batch
        .next()?
        .ok_or_else(|| NlqError::Execution("No statement to execute".to_string()))?;
    if batch.next()?.is_some() {
        warn!("Refusing multi-statement text: {}", sql);
        return Err(NlqError::Execution(MULTIPLE_STATEMENTS.to_string()));
    }

    if !stmt.readonly() {
        warn!("Engine reports statement as writing, refusing: {}", sql);
        return Err(NlqError::UnsafeStatement);
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut cursor = stmt.query([])?;

    let mut rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = cursor.next()? {
        if row_limit.is_some_and(|limit| rows.len() >= limit) {
            truncated = true;
            break;
        }
        let mut record = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            record.insert(name.clone(), value_to_json(row.get_ref(idx)?));
        }
        rows.push(record);
    }

    if truncated {
        warn!("Result truncated to {} rows", rows.len());
    }

    let elapsed = started.elapsed().as_millis() as u64;
    Ok(QueryResult::new(columns, rows, truncated, ENGINE_NAME, elapsed))
}

#[async_trait]
impl ExecutionEngine for SqliteEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn describe_schema(&self) -> Result<SchemaDescription> {
        let path = self.path.clone();
        debug!("Reading schema from {:?}", path);

        tokio::task::spawn_blocking(move || {
            let conn = open_read_only(&path).map_err(|e| {
                NlqError::SchemaUnavailable(format!("{} ({})", e, path.display()))
            })?;
            read_schema(&conn)
        })
        .await
        .map_err(|e| NlqError::SchemaUnavailable(format!("Schema task failed: {}", e)))?
    }

    async fn execute(&self, sql: &CandidateSql, ctx: &ExecutionContext) -> Result<QueryResult> {
        let path = self.path.clone();
        let statement = sql.as_str().to_string();
        let row_limit = ctx.row_limit;

        let result = tokio::task::spawn_blocking(move || run_query(&path, &statement, row_limit))
            .await
            .map_err(|e| NlqError::Execution(format!("Query task failed: {}", e)))??;

        info!(
            "Query returned {} rows in {} ms",
            result.row_count, result.execution_time_ms
        );
        Ok(result)
    }
}
