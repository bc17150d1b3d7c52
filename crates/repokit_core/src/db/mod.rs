//! Connection acquisition, lifetime and transaction primitives.
//!
//! # Responsibility
//! - Open and configure SQLite connections through a factory collaborator.
//! - Decide per call whether a connection is owned (created here) or borrowed
//!   from a caller transaction.
//! - Release owned connections on every exit path.
//!
//! # Invariants
//! - A connection reached through a caller transaction is never closed here.
//! - A connection created by the factory is released exactly once.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod factory;
mod lease;
mod transaction;

pub use factory::{AsyncConnection, ConnectionFactory, DatabaseTarget, SqliteConnectionFactory};
pub use lease::{AsyncConnectionLease, ConnectionLease};
pub use transaction::AsyncTransaction;

pub type DbResult<T> = Result<T, DbError>;

/// Driver-level failure surfaced unchanged to callers.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Async(tokio_rusqlite::Error),
    ConnectionClosed,
}

impl DbError {
    /// Returns the underlying SQLite error code, when the failure came from SQLite.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Self::Sqlite(err) => err.sqlite_error_code(),
            Self::Async(tokio_rusqlite::Error::Rusqlite(err)) => err.sqlite_error_code(),
            _ => None,
        }
    }

    /// Whether the statement was interrupted (command timeout or cancellation).
    pub fn is_interrupted(&self) -> bool {
        self.sqlite_code() == Some(rusqlite::ErrorCode::OperationInterrupted)
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Async(err) => write!(f, "{err}"),
            Self::ConnectionClosed => write!(f, "database connection is already closed"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Async(err) => Some(err),
            Self::ConnectionClosed => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(value: tokio_rusqlite::Error) -> Self {
        match value {
            tokio_rusqlite::Error::Rusqlite(err) => Self::Sqlite(err),
            tokio_rusqlite::Error::ConnectionClosed => Self::ConnectionClosed,
            other => Self::Async(other),
        }
    }
}
