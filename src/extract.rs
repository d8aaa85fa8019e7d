//! Recover a single SQL statement from free-form model output.
//!
//! This is a text heuristic, not a parser. It does not check syntax, count
//! statements or look for terminators; the safety gate and the engine deal
//! with whatever comes out.

use crate::llm::RawCompletion;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    /// First fenced block, any case, spanning lines. An info string starting
    /// with `sql` (`sql`, `sqlite`, ...) is dropped whole.
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?is)```(?:sql\w*)?(.*?)```").expect("valid regex");
}

/// Statement pulled out of a completion. Unvetted until it passes the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSql(String);

impl CandidateSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seam for swapping the heuristic for a stricter parser.
pub trait SqlExtractor: Send + Sync {
    fn extract(&self, raw: &RawCompletion) -> CandidateSql;
}

/// Default extractor: first code fence wins, otherwise the whole text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedBlockExtractor;

impl SqlExtractor for FencedBlockExtractor {
    fn extract(&self, raw: &RawCompletion) -> CandidateSql {
        extract_sql(raw)
    }
}

pub fn extract_sql(raw: &RawCompletion) -> CandidateSql {
    let text = raw.as_str();
    let body = match FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    };

    CandidateSql(body.replace("\r\n", " ").replace('\n', " "))
}
