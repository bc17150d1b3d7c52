//! Delegated operation implementations.
//!
//! # Responsibility
//! - Build, trace and execute the statements behind every operation family
//!   on a connection the caller already resolved.
//! - Map result rows into [`crate::model::record::Record`]s.
//!
//! # Invariants
//! - Never opens, closes or commits a caller-owned connection or transaction.
//! - Multi-statement operations are atomic: they run in the caller's
//!   transaction when there is one, otherwise in their own.
//! - Parameters reach the statement builder unchanged.

mod execute;
mod read;
mod write;

pub use execute::{primary_key_of, run_async, Table};
pub use read::{aggregate, batch_query, count, exists, query, query_multiple};
pub use write::{
    delete, delete_all, insert, insert_all, merge, merge_all, truncate, update, update_all,
};

use crate::model::record::Record;
use crate::repo::error::RepoResult;
use crate::repo::settings::RepositorySettings;
use crate::statement::Statement;
use rusqlite::types::Value;
use rusqlite::Connection;

/// Executes caller-supplied SQL and returns the affected row count.
pub fn execute_non_query(
    conn: &Connection,
    settings: &RepositorySettings,
    sql: &str,
    params: &[Value],
) -> RepoResult<usize> {
    execute::execute(
        conn,
        settings,
        "execute_non_query",
        Statement::new(sql, params.to_vec()),
    )
}

/// Executes caller-supplied SQL and returns the first column of the first row.
pub fn execute_scalar(
    conn: &Connection,
    settings: &RepositorySettings,
    sql: &str,
    params: &[Value],
) -> RepoResult<Value> {
    execute::scalar(
        conn,
        settings,
        "execute_scalar",
        Statement::new(sql, params.to_vec()),
    )
}

pub fn execute_query(
    conn: &Connection,
    settings: &RepositorySettings,
    sql: &str,
    params: &[Value],
) -> RepoResult<Vec<Record>> {
    execute::query(
        conn,
        settings,
        "execute_query",
        Statement::new(sql, params.to_vec()),
    )
}
