//! Query Log
//!
//! Audit trail of answered questions: a bounded in-memory buffer plus an
//! optional JSON-lines file.

use crate::error::{NlqError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One answered question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub query_id: String,
    pub question: String,
    pub sql_generated: Option<String>,
    pub success: bool,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub rows_returned: usize,
    pub execution_time_ms: u64,
}

#[derive(Clone)]
pub struct QueryLog {
    log_file: Option<PathBuf>,
    entries: Arc<Mutex<VecDeque<QueryLogEntry>>>,
    max_in_memory: usize,
}

impl QueryLog {
    pub fn new(log_file: Option<PathBuf>, max_in_memory: usize) -> Self {
        Self {
            log_file,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(max_in_memory.min(1024)))),
            max_in_memory,
        }
    }

    /// Record an entry in memory and, if configured, append it to the file.
    pub fn record(&self, entry: QueryLogEntry) -> Result<()> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.push_back(entry.clone());
            while entries.len() > self.max_in_memory {
                entries.pop_front();
            }
        }

        if let Some(ref log_file) = self.log_file {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .map_err(|e| NlqError::QueryLog(format!("Failed to open log file: {}", e)))?;

            let json = serde_json::to_string(&entry)
                .map_err(|e| NlqError::QueryLog(format!("Failed to serialize log: {}", e)))?;

            writeln!(file, "{}", json)
                .map_err(|e| NlqError::QueryLog(format!("Failed to write log: {}", e)))?;
        }

        Ok(())
    }

    /// Most recent entries first
    pub fn recent(&self, limit: usize) -> Vec<QueryLogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// (succeeded, failed)
    pub fn stats(&self) -> (u64, u64) {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let succeeded = entries.iter().filter(|e| e.success).count() as u64;
        (succeeded, entries.len() as u64 - succeeded)
    }
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new(None, 1000)
    }
}
