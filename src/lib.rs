//! Natural-language questions over the QuickDocs database.
//!
//! The entry point is [`pipeline::NlQueryPipeline::answer`], which always
//! returns a [`pipeline::QueryOutcome`].

pub mod config;
pub mod error;
pub mod execution;
pub mod extract;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod safety;
pub mod schema;

pub use config::Config;
pub use error::{NlqError, Result};
pub use pipeline::{NlQueryPipeline, QueryOutcome};
