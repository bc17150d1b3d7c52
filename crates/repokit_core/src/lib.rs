//! Repository-pattern data access over SQLite.
//!
//! A [`DbRepository`] resolves one connection per call (the caller
//! transaction's, or a fresh one from its [`ConnectionFactory`]), forwards
//! the call to the delegated operation and releases what it opened.

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod ops;
pub mod repo;
pub mod statement;
pub mod trace;

pub use cache::{Cache, DEFAULT_CACHE_EXPIRATION};
pub use config::RepositoryConfig;
pub use db::{
    AsyncConnection, AsyncTransaction, ConnectionFactory, DatabaseTarget, DbError, DbResult,
    SqliteConnectionFactory,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::field::{Field, Order, OrderField};
pub use model::options::{BatchQueryOptions, QueryOptions, QueryRequest};
pub use model::query::{Conjunction, Filter, Operation, QueryField, QueryGroup};
pub use model::record::{record_of, take_field, Entity, Record, DEFAULT_BATCH_OPERATION_SIZE};
pub use repo::{BaseRepository, DbRepository, RepoError, RepoResult, RepositorySettings};
pub use statement::{Aggregate, QuerySpec, SqliteStatementBuilder, Statement, StatementBuilder};
pub use trace::{CancellableTraceLog, Trace, TraceLog};

pub use rusqlite::types::Value;
pub use tokio_util::sync::CancellationToken;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
