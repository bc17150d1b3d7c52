//! Execution trace hook.
//!
//! # Responsibility
//! - Notify a caller-supplied hook before and after every statement a
//!   repository operation executes.
//! - Let the hook veto a statement before it runs.
//!
//! # Invariants
//! - `before_execution` and `after_execution` of one statement share a
//!   `session_id`.
//! - `after_execution` is not called for a cancelled statement.

use rusqlite::types::Value;
use std::time::Duration;
use uuid::Uuid;

/// Statement-level trace record.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLog {
    pub session_id: Uuid,
    /// Operation family that issued the statement, e.g. `"insert_all"`.
    pub key: String,
    pub statement: String,
    pub parameters: Vec<Value>,
    /// Set on `after_execution` only.
    pub elapsed: Option<Duration>,
    /// Set on `after_execution` only.
    pub succeeded: Option<bool>,
}

impl TraceLog {
    pub fn new(
        key: impl Into<String>,
        statement: impl Into<String>,
        parameters: Vec<Value>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            key: key.into(),
            statement: statement.into(),
            parameters,
            elapsed: None,
            succeeded: None,
        }
    }
}

/// Trace record handed to `before_execution`; the hook may cancel it.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellableTraceLog {
    pub log: TraceLog,
    cancelled: bool,
}

impl CancellableTraceLog {
    pub fn new(log: TraceLog) -> Self {
        Self {
            log,
            cancelled: false,
        }
    }

    /// Prevents the statement from running; the operation fails with
    /// `RepoError::TraceCancelled`.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Hook invoked around statement execution.
pub trait Trace: Send + Sync {
    fn before_execution(&self, _log: &mut CancellableTraceLog) {}

    fn after_execution(&self, _log: &TraceLog) {}
}
