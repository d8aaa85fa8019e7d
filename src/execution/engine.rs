//! Execution Engine Trait - contract the pipeline runs against

use crate::error::Result;
use crate::execution::result::QueryResult;
use crate::extract::CandidateSql;
use crate::schema::SchemaDescription;
use async_trait::async_trait;

/// Per-request execution settings
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Stop materializing after this many rows
    pub row_limit: Option<usize>,
}

impl ExecutionContext {
    pub fn with_row_limit(row_limit: Option<usize>) -> Self {
        Self { row_limit }
    }
}

/// Execution engine trait
///
/// Implementations acquire their own connection per call and must never
/// allow a statement to modify the database.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Engine name (e.g., "sqlite")
    fn name(&self) -> &'static str;

    /// Render every table definition from the catalog.
    ///
    /// Fails with `SchemaUnavailable` when the catalog cannot be read.
    async fn describe_schema(&self) -> Result<SchemaDescription>;

    /// Run a vetted statement as a single read query.
    ///
    /// Fails with `ExecutionError` carrying the engine message.
    async fn execute(&self, sql: &CandidateSql, ctx: &ExecutionContext) -> Result<QueryResult>;
}
