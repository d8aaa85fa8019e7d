//! Execution Module - read-only query execution behind a pluggable engine
//!
//! - ExecutionEngine trait: schema introspection and statement execution
//! - QueryResult: column-ordered rows ready for display
//! - SqliteEngine: the SQLite implementation

pub mod engine;
pub mod result;
pub mod sqlite_engine;

pub use engine::{ExecutionContext, ExecutionEngine};
pub use result::{QueryResult, Row};
pub use sqlite_engine::SqliteEngine;
