//! Process-wide configuration.
//!
//! Built once at startup and shared behind an `Arc`. Nothing in the pipeline
//! reads the environment directly; everything flows from [`Config`].

use crate::error::{NlqError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "quickdocs.db";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Text-generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl Provider {
    /// Environment variable holding this provider's credential
    pub fn credential_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-1.5-pro-latest",
            Provider::OpenAi => "gpt-4",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl FromStr for Provider {
    type Err = NlqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" | "open_ai" => Ok(Provider::OpenAi),
            other => Err(NlqError::Config(format!(
                "Unknown provider '{}' (expected 'gemini' or 'openai')",
                other
            ))),
        }
    }
}

/// Settings owned by the generation client.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: usize,
}

impl GenerationConfig {
    pub fn new(provider: Provider, api_key: Option<String>) -> Self {
        Self {
            provider,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// The configured credential, or `MissingCredential` naming the variable to set.
    pub fn credential(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| NlqError::MissingCredential {
                var: self.provider.credential_var().to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub generation: GenerationConfig,
    /// Hard cap on returned rows; `None` disables the cap.
    pub max_rows: Option<usize>,
    /// Parse candidates and reject anything but a single query statement.
    pub strict_sql: bool,
    /// JSON-lines audit file for answered questions.
    pub query_log: Option<PathBuf>,
}

impl Config {
    pub fn new(database_path: impl Into<PathBuf>, generation: GenerationConfig) -> Self {
        Self {
            database_path: database_path.into(),
            generation,
            max_rows: Some(DEFAULT_MAX_ROWS),
            strict_sql: false,
            query_log: None,
        }
    }

    /// Load from the process environment. Call `dotenv::dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match lookup("NLQ_PROVIDER") {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => Provider::Gemini,
        };

        let mut generation = GenerationConfig::new(provider, lookup(provider.credential_var()));
        if let Some(model) = non_empty(lookup("NLQ_MODEL")) {
            generation.model = model;
        }
        if let Some(base_url) = non_empty(lookup("NLQ_BASE_URL")) {
            generation.base_url = base_url.trim_end_matches('/').to_string();
        }
        generation.timeout = Duration::from_secs(parse_or(
            &lookup,
            "NLQ_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);
        generation.max_retries = parse_or(&lookup, "NLQ_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;

        let database_path = non_empty(lookup("QUICKDOCS_DATABASE"))
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let max_rows = match parse_or(&lookup, "NLQ_MAX_ROWS", DEFAULT_MAX_ROWS)? {
            0 => None,
            n => Some(n),
        };

        let strict_sql = match non_empty(lookup("NLQ_STRICT_SQL")) {
            Some(value) => parse_bool("NLQ_STRICT_SQL", &value)?,
            None => false,
        };

        let config = Self {
            database_path: PathBuf::from(database_path),
            generation,
            max_rows,
            strict_sql,
            query_log: non_empty(lookup("NLQ_QUERY_LOG")).map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    /// Structural checks. A missing credential is not a validation failure:
    /// the pipeline reports it per question.
    pub fn validate(&self) -> Result<()> {
        if self.generation.model.trim().is_empty() {
            return Err(NlqError::Config("Model name must not be empty".to_string()));
        }
        if !self.generation.base_url.starts_with("http://")
            && !self.generation.base_url.starts_with("https://")
        {
            return Err(NlqError::Config(format!(
                "Base URL must be http(s): {}",
                self.generation.base_url
            )));
        }
        if self.generation.timeout.is_zero() {
            return Err(NlqError::Config("Timeout must be greater than zero".to_string()));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(NlqError::Config("Database path must not be empty".to_string()));
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse()
            .map_err(|_| NlqError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(NlqError::Config(format!("{} must be a boolean, got '{}'", key, raw))),
    }
}
