//! Repository error type.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every repository operation.
///
/// Driver failures arrive unchanged inside [`RepoError::Db`]; the remaining
/// variants come from statement building, predicate resolution, row mapping,
/// the trace hook and cancellation.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Table or column name rejected by the statement builder.
    InvalidIdentifier(String),
    /// Table hint rejected by the statement builder.
    InvalidHints(String),
    /// Key-based operation on a table without a resolvable primary key.
    MissingPrimaryKey(String),
    /// Write operation with an empty payload.
    MissingFields(String),
    InvalidFilter(String),
    InvalidData(String),
    /// The trace hook cancelled execution before the statement ran.
    TraceCancelled { key: String },
    /// The caller's cancellation token fired.
    Cancelled,
}

impl RepoError {
    /// Whether SQLite interrupted the statement (command timeout or cancellation).
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Db(err) => err.is_interrupted(),
            Self::Cancelled => true,
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidIdentifier(name) => write!(f, "invalid identifier `{name}`"),
            Self::InvalidHints(hints) => write!(f, "unsupported table hints `{hints}`"),
            Self::MissingPrimaryKey(table) => write!(f, "table `{table}` has no primary key"),
            Self::MissingFields(table) => write!(f, "no fields to write for `{table}`"),
            Self::InvalidFilter(message) => write!(f, "invalid filter: {message}"),
            Self::InvalidData(message) => write!(f, "invalid row data: {message}"),
            Self::TraceCancelled { key } => write!(f, "execution of `{key}` cancelled by trace"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<tokio_rusqlite::Error> for RepoError {
    fn from(value: tokio_rusqlite::Error) -> Self {
        Self::Db(DbError::from(value))
    }
}
