//! Read-only enforcement for generated SQL.
//!
//! [`authorize`] is a prefix check, not a parser. A statement that starts
//! with SELECT but smuggles a write through a vendor extension passes it.
//! Two further layers narrow that gap: [`ensure_single_query`] (opt-in,
//! parser based) and the executor, which opens the database read-only and
//! refuses statements SQLite does not report as read-only.

use crate::error::{NlqError, Result};
use crate::extract::CandidateSql;
use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::{debug, warn};

/// Accept the candidate only if it begins with `select` (any case, after trim).
pub fn authorize(candidate: CandidateSql) -> Result<CandidateSql> {
    if is_select(candidate.as_str()) {
        Ok(candidate)
    } else {
        warn!("Rejected non-SELECT statement: {}", candidate);
        Err(NlqError::UnsafeStatement)
    }
}

pub fn is_select(sql: &str) -> bool {
    sql.trim()
        .get(..6)
        .map(|prefix| prefix.eq_ignore_ascii_case("select"))
        .unwrap_or(false)
}

/// Reject candidates that parse into anything other than exactly one query.
///
/// Text the parser cannot handle is let through so the engine reports the
/// real syntax error.
pub fn ensure_single_query(candidate: &CandidateSql) -> Result<()> {
    match Parser::parse_sql(&SQLiteDialect {}, candidate.as_str()) {
        Ok(statements) => match statements.as_slice() {
            [Statement::Query(_)] => Ok(()),
            other => {
                warn!(
                    "Rejected candidate parsing into {} statement(s) that are not a single query",
                    other.len()
                );
                Err(NlqError::UnsafeStatement)
            }
        },
        Err(e) => {
            debug!("Strict check could not parse candidate, deferring to engine: {}", e);
            Ok(())
        }
    }
}
