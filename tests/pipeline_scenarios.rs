use async_trait::async_trait;
use quickdocs_nlq::config::{Config, GenerationConfig, Provider};
use quickdocs_nlq::execution::SqliteEngine;
use quickdocs_nlq::llm::{RawCompletion, TextGenerator};
use quickdocs_nlq::observability::QueryLog;
use quickdocs_nlq::prompt::Prompt;
use quickdocs_nlq::{NlQueryPipeline, NlqError, QueryOutcome};
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Returns a fixed completion and counts calls.
struct StubGenerator {
    completion: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn new(completion: &str) -> Arc<Self> {
        Arc::new(Self {
            completion: completion.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &Prompt) -> quickdocs_nlq::Result<RawCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.as_str().to_string());
        Ok(RawCompletion::new(self.completion.clone()))
    }
}

/// Fails the test if it is ever invoked.
struct PanickingGenerator;

#[async_trait]
impl TextGenerator for PanickingGenerator {
    async fn generate(&self, _prompt: &Prompt) -> quickdocs_nlq::Result<RawCompletion> {
        panic!("generation service must not be called");
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &Prompt) -> quickdocs_nlq::Result<RawCompletion> {
        Err(NlqError::GenerationService(
            "LLM API error (429 Too Many Requests): quota exhausted".to_string(),
        ))
    }
}

fn seed_database(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("quickdocs.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT UNIQUE NOT NULL);
         CREATE TABLE processes (id INTEGER PRIMARY KEY, name TEXT NOT NULL, status TEXT DEFAULT 'active');
         INSERT INTO customers (name, email) VALUES ('Ada Lovelace', 'ada@example.com');
         INSERT INTO customers (name, email) VALUES ('Grace Hopper', 'grace@example.com');
         INSERT INTO customers (name, email) VALUES ('Alan Turing', 'alan@example.com');
         INSERT INTO processes (name) VALUES ('KYC Onboarding');",
    )
    .unwrap();
    path
}

fn config_for(path: &Path, api_key: Option<&str>) -> Arc<Config> {
    let generation = GenerationConfig::new(Provider::Gemini, api_key.map(String::from));
    Arc::new(Config::new(path, generation))
}

fn pipeline(path: &Path, generator: Arc<dyn TextGenerator>) -> NlQueryPipeline {
    NlQueryPipeline::new(
        config_for(path, Some("test-key")),
        Arc::new(SqliteEngine::new(path)),
        generator,
    )
}

fn customer_count(path: &Path) -> i64 {
    Connection::open(path)
        .unwrap()
        .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn missing_credential_short_circuits_before_any_call() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let pipeline = NlQueryPipeline::new(
        config_for(&path, None),
        Arc::new(SqliteEngine::new(&path)),
        Arc::new(PanickingGenerator),
    );

    let outcome = pipeline.answer("how many customers are there").await;

    assert_eq!(outcome.sql_text, "");
    assert!(outcome.rows.is_empty());
    assert_eq!(
        outcome.error_message().as_deref(),
        Some("GEMINI_API_KEY not set. Please configure the API key.")
    );
}

#[tokio::test]
async fn fenced_select_is_executed() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let generator = StubGenerator::new("```sql\nSELECT COUNT(*) FROM customers\n```");
    let pipeline = pipeline(&path, generator.clone());

    let outcome = pipeline.answer("how many customers are there").await;

    assert_eq!(outcome.sql_text, "SELECT COUNT(*) FROM customers");
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0]["COUNT(*)"], json!(3));
    assert_eq!(generator.calls(), 1);

    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("CREATE TABLE customers"));
    assert!(prompts[0].contains("how many customers are there"));
}

#[tokio::test]
async fn delete_is_rejected_and_shown() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let pipeline = pipeline(&path, StubGenerator::new("DELETE FROM customers"));

    let outcome = pipeline.answer("remove every customer").await;

    assert_eq!(
        outcome,
        QueryOutcome {
            sql_text: "DELETE FROM customers".to_string(),
            rows: Vec::new(),
            error: Some(NlqError::UnsafeStatement),
            truncated: false,
        }
    );
    assert_eq!(outcome.error_message().as_deref(), Some("Only SELECT queries are allowed."));
    assert_eq!(customer_count(&path), 3);
}

#[tokio::test]
async fn malformed_select_reports_engine_error() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let pipeline = pipeline(&path, StubGenerator::new("SELECT FROM"));

    let outcome = pipeline.answer("give me something").await;

    assert_eq!(outcome.sql_text, "SELECT FROM");
    assert!(outcome.rows.is_empty());
    match outcome.error {
        Some(NlqError::Execution(ref msg)) => assert!(msg.contains("syntax error"), "{}", msg),
        ref other => panic!("expected execution error, got {:?}", other),
    }
}

#[tokio::test]
async fn unreadable_catalog_skips_generation() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.db");
    let generator = StubGenerator::new("SELECT 1");
    let pipeline = pipeline(&missing, generator.clone());

    let outcome = pipeline.answer("how many customers are there").await;

    assert_eq!(outcome.sql_text, "");
    assert!(outcome.rows.is_empty());
    assert!(matches!(outcome.error, Some(NlqError::SchemaUnavailable(_))));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn generation_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let pipeline = pipeline(&path, Arc::new(FailingGenerator));

    let outcome = pipeline.answer("how many customers are there").await;

    assert_eq!(outcome.sql_text, "");
    assert!(outcome.rows.is_empty());
    let message = outcome.error_message().unwrap();
    assert!(message.starts_with("Generation service error:"));
    assert!(message.contains("quota exhausted"));
}

#[tokio::test]
async fn identical_questions_give_identical_outcomes() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let pipeline = pipeline(
        &path,
        StubGenerator::new("```sql\nSELECT name, email\nFROM customers\nORDER BY id\n```"),
    );

    let first = pipeline.answer("list customers").await;
    let second = pipeline.answer("list customers").await;

    assert_eq!(first, second);
    assert_eq!(first.sql_text, "SELECT name, email FROM customers ORDER BY id");
    assert_eq!(first.rows.len(), 3);
    let columns: Vec<&String> = first.rows[0].keys().collect();
    assert_eq!(columns, vec!["name", "email"]);
}

#[tokio::test]
async fn row_cap_applies_to_outcome() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let mut config = Config::new(&path, GenerationConfig::new(Provider::Gemini, Some("k".to_string())));
    config.max_rows = Some(2);
    let pipeline = NlQueryPipeline::new(
        Arc::new(config),
        Arc::new(SqliteEngine::new(&path)),
        StubGenerator::new("SELECT id FROM customers"),
    );

    let outcome = pipeline.answer("all customer ids").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.rows.len(), 2);
    assert!(outcome.truncated);
}

#[tokio::test]
async fn result_within_cap_is_not_truncated() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let mut config = Config::new(&path, GenerationConfig::new(Provider::Gemini, Some("k".to_string())));
    config.max_rows = Some(3);
    let pipeline = NlQueryPipeline::new(
        Arc::new(config),
        Arc::new(SqliteEngine::new(&path)),
        StubGenerator::new("SELECT id FROM customers"),
    );

    let outcome = pipeline.answer("all customer ids").await;

    assert_eq!(outcome.rows.len(), 3);
    assert!(!outcome.truncated);
}

#[tokio::test]
async fn strict_mode_rejects_stacked_statements() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let mut config = Config::new(&path, GenerationConfig::new(Provider::Gemini, Some("k".to_string())));
    config.strict_sql = true;
    let pipeline = NlQueryPipeline::new(
        Arc::new(config),
        Arc::new(SqliteEngine::new(&path)),
        StubGenerator::new("SELECT 1; DELETE FROM customers"),
    );

    let outcome = pipeline.answer("sneaky").await;

    assert_eq!(outcome.error, Some(NlqError::UnsafeStatement));
    assert_eq!(outcome.sql_text, "SELECT 1; DELETE FROM customers");
    assert_eq!(customer_count(&path), 3);
}

#[tokio::test]
async fn stacked_statements_fail_without_strict_mode() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let pipeline = pipeline(&path, StubGenerator::new("SELECT 1; DELETE FROM customers"));

    let outcome = pipeline.answer("sneaky").await;

    assert_eq!(outcome.sql_text, "SELECT 1; DELETE FROM customers");
    assert!(outcome.rows.is_empty());
    assert_eq!(
        outcome.error_message().as_deref(),
        Some("Query execution failed: You can only execute one statement at a time.")
    );
    assert_eq!(customer_count(&path), 3);
}

#[tokio::test]
async fn outcomes_are_recorded_in_query_log() {
    let dir = TempDir::new().unwrap();
    let path = seed_database(&dir);
    let log_path = dir.path().join("queries.jsonl");
    let pipeline = pipeline(&path, StubGenerator::new("DELETE FROM customers"))
        .with_query_log(QueryLog::new(Some(log_path.clone()), 10));

    pipeline.answer("remove every customer").await;

    let log = pipeline.query_log().unwrap();
    let recent = log.recent(1);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].question, "remove every customer");
    assert_eq!(recent[0].sql_generated.as_deref(), Some("DELETE FROM customers"));
    assert_eq!(recent[0].error_kind.as_deref(), Some("unsafe_statement"));
    assert!(!recent[0].success);
    assert_eq!(std::fs::read_to_string(&log_path).unwrap().lines().count(), 1);
}
