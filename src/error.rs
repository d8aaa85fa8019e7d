use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NlqError {
    #[error("{var} not set. Please configure the API key.")]
    MissingCredential { var: String },

    #[error("Could not read database schema: {0}")]
    SchemaUnavailable(String),

    #[error("Generation service error: {0}")]
    GenerationService(String),

    #[error("Only SELECT queries are allowed.")]
    UnsafeStatement,

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Query log error: {0}")]
    QueryLog(String),
}

impl NlqError {
    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            NlqError::MissingCredential { .. } => "missing_credential",
            NlqError::SchemaUnavailable(_) => "schema_unavailable",
            NlqError::GenerationService(_) => "generation_service_error",
            NlqError::UnsafeStatement => "unsafe_statement",
            NlqError::Execution(_) => "execution_error",
            NlqError::Config(_) => "config_error",
            NlqError::QueryLog(_) => "query_log_error",
        }
    }
}

impl Serialize for NlqError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("NlqError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<rusqlite::Error> for NlqError {
    fn from(err: rusqlite::Error) -> Self {
        NlqError::Execution(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NlqError>;
