//! Statement builder collaborator.
//!
//! # Responsibility
//! - Turn operation parameters (table, payload, predicate, projection,
//!   ordering, hints) into one parameterized SQL statement.
//!
//! # Invariants
//! - Every value reaches SQLite as a bound parameter, never as SQL text.
//! - Identifiers and hints are validated before they are spliced into SQL.

use crate::model::field::{Field, OrderField};
use crate::model::query::QueryGroup;
use crate::model::record::Record;
use crate::repo::error::RepoResult;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

mod sqlite;

pub use sqlite::{quote_identifier, SqliteStatementBuilder};

/// SQL text plus positional parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Aggregate function applied by the aggregate operation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Count,
    Sum,
    Max,
    Min,
    Average,
}

impl Aggregate {
    pub fn function(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Average => "AVG",
        }
    }
}

/// Shape of a `SELECT` issued by the query families.
#[derive(Debug, Clone, Copy)]
pub struct QuerySpec<'a> {
    pub table: &'a str,
    /// `None` or empty selects every column.
    pub fields: Option<&'a [Field]>,
    pub filter: Option<&'a QueryGroup>,
    pub order_by: &'a [OrderField],
    pub top: Option<u32>,
    pub hints: Option<&'a str>,
}

impl<'a> QuerySpec<'a> {
    pub fn new(table: &'a str) -> Self {
        Self {
            table,
            fields: None,
            filter: None,
            order_by: &[],
            top: None,
            hints: None,
        }
    }
}

/// Builds the statements executed by the delegated operations.
///
/// Shared by every call of a repository, so implementations must be
/// stateless or internally synchronized.
pub trait StatementBuilder: Send + Sync {
    fn create_insert(&self, table: &str, record: &Record, hints: Option<&str>)
        -> RepoResult<Statement>;

    /// Multi-row insert; columns are the union of every record's columns.
    fn create_insert_all(
        &self,
        table: &str,
        records: &[Record],
        hints: Option<&str>,
    ) -> RepoResult<Statement>;

    /// `UPDATE` setting every column of `record`.
    fn create_update(
        &self,
        table: &str,
        record: &Record,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement>;

    fn create_delete(
        &self,
        table: &str,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement>;

    fn create_query(&self, spec: &QuerySpec<'_>) -> RepoResult<Statement>;

    /// Zero-based `page` of `rows_per_batch` rows; `spec.top` is ignored.
    fn create_batch_query(
        &self,
        spec: &QuerySpec<'_>,
        page: u32,
        rows_per_batch: u32,
    ) -> RepoResult<Statement>;

    /// Single-value aggregate; `field` may be `None` only for [`Aggregate::Count`].
    fn create_aggregate(
        &self,
        table: &str,
        aggregate: Aggregate,
        field: Option<&Field>,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement>;

    fn create_exists(
        &self,
        table: &str,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement>;

    fn create_truncate(&self, table: &str) -> RepoResult<Statement>;
}
