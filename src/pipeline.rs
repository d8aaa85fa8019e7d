//! Natural-language query pipeline
//!
//! question → schema → prompt → generation → extraction → safety gate →
//! execution. Every failure is folded into a [`QueryOutcome`]; nothing
//! escapes `answer` as an error.

use crate::config::Config;
use crate::error::{NlqError, Result};
use crate::execution::{ExecutionContext, ExecutionEngine, Row, SqliteEngine};
use crate::extract::{CandidateSql, FencedBlockExtractor, SqlExtractor};
use crate::llm::{LlmClient, TextGenerator};
use crate::observability::{QueryLog, QueryLogEntry};
use crate::prompt::build_prompt;
use crate::safety::{authorize, ensure_single_query};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Uniform result of one question.
///
/// `rows` is empty whenever `error` is set. `sql_text` holds whatever
/// candidate existed when the pipeline stopped (empty before extraction).
/// `truncated` is set when the row cap cut `rows` short.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub sql_text: String,
    pub rows: Vec<Row>,
    pub error: Option<NlqError>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl QueryOutcome {
    pub fn success(sql_text: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            sql_text: sql_text.into(),
            rows,
            error: None,
            truncated: false,
        }
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn failure(sql_text: impl Into<String>, error: NlqError) -> Self {
        Self {
            sql_text: sql_text.into(),
            rows: Vec::new(),
            error: Some(error),
            truncated: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Human-readable error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

pub struct NlQueryPipeline {
    config: Arc<Config>,
    engine: Arc<dyn ExecutionEngine>,
    generator: Arc<dyn TextGenerator>,
    extractor: Arc<dyn SqlExtractor>,
    query_log: Option<QueryLog>,
}

impl NlQueryPipeline {
    pub fn new(
        config: Arc<Config>,
        engine: Arc<dyn ExecutionEngine>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            engine,
            generator,
            extractor: Arc::new(FencedBlockExtractor),
            query_log: None,
        }
    }

    /// SQLite engine on `database_path`, HTTP generation client, and a query
    /// log when one is configured.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let engine = Arc::new(SqliteEngine::new(config.database_path.clone()));
        let generator = Arc::new(LlmClient::new(config.generation.clone())?);
        let query_log = config
            .query_log
            .as_ref()
            .map(|path| QueryLog::new(Some(path.clone()), 1000));

        let mut pipeline = Self::new(config, engine, generator);
        pipeline.query_log = query_log;
        Ok(pipeline)
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn SqlExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_query_log(mut self, query_log: QueryLog) -> Self {
        self.query_log = Some(query_log);
        self
    }

    pub fn query_log(&self) -> Option<&QueryLog> {
        self.query_log.as_ref()
    }

    pub fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }

    /// Answer a natural-language question.
    pub async fn answer(&self, question: &str) -> QueryOutcome {
        let query_id = Uuid::new_v4().to_string();
        let span = info_span!("answer", query_id = %query_id);
        let started = Instant::now();

        let outcome = self.run(question).instrument(span.clone()).await;
        let elapsed = started.elapsed().as_millis() as u64;

        span.in_scope(|| match &outcome.error {
            None => info!("Answered with {} rows in {} ms", outcome.rows.len(), elapsed),
            Some(e) => warn!("Question failed ({}): {}", e.kind(), e),
        });

        if let Some(ref log) = self.query_log {
            let entry = QueryLogEntry {
                timestamp: Utc::now(),
                query_id,
                question: question.to_string(),
                sql_generated: Some(outcome.sql_text.clone()).filter(|s| !s.is_empty()),
                success: outcome.is_success(),
                error_kind: outcome.error.as_ref().map(|e| e.kind().to_string()),
                error_message: outcome.error_message(),
                rows_returned: outcome.rows.len(),
                execution_time_ms: elapsed,
            };
            if let Err(e) = log.record(entry) {
                warn!("Failed to record query log entry: {}", e);
            }
        }

        outcome
    }

    async fn run(&self, question: &str) -> QueryOutcome {
        info!("Question: {}", question);

        // No network or database work without a credential
        if let Err(e) = self.config.generation.credential() {
            return QueryOutcome::failure("", e);
        }

        let schema = match self.engine.describe_schema().await {
            Ok(schema) => schema,
            Err(e) => return QueryOutcome::failure("", e),
        };

        let prompt = build_prompt(&schema, question);

        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => return QueryOutcome::failure("", e),
        };

        let candidate = self.extractor.extract(&raw);
        info!("Generated SQL: {}", candidate);
        let sql_text = candidate.as_str().to_string();

        let vetted = match self.vet(candidate) {
            Ok(vetted) => vetted,
            Err(e) => return QueryOutcome::failure(sql_text, e),
        };

        let ctx = ExecutionContext::with_row_limit(self.config.max_rows);
        info!("Executing on {}", self.engine.name());
        match self.engine.execute(&vetted, &ctx).await {
            Ok(result) => QueryOutcome::success(sql_text, result.rows).with_truncated(result.truncated),
            Err(e) => QueryOutcome::failure(sql_text, e),
        }
    }

    fn vet(&self, candidate: CandidateSql) -> Result<CandidateSql> {
        let candidate = authorize(candidate)?;
        if self.config.strict_sql {
            ensure_single_query(&candidate)?;
        }
        Ok(candidate)
    }
}
