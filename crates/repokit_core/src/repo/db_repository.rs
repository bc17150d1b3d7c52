//! Blocking repository façade.
//!
//! # Responsibility
//! - Resolve one connection per call: the caller transaction's, or a fresh
//!   one from the factory.
//! - Forward every parameter unchanged to exactly one delegated operation.
//! - Release owned connections once the delegated call returns.
//!
//! # Invariants
//! - Connections reached through a caller transaction are never released.
//! - Owned connections are released on success and on error (lease `Drop`).
//! - Delegated errors reach the caller unmodified.

use crate::config::RepositoryConfig;
use crate::db::{AsyncConnection, ConnectionFactory, ConnectionLease, SqliteConnectionFactory};
use crate::model::field::Field;
use crate::model::options::{BatchQueryOptions, QueryOptions, QueryRequest};
use crate::model::query::Filter;
use crate::model::record::{Entity, Record};
use crate::ops::{self, Table};
use crate::repo::error::RepoResult;
use crate::repo::settings::RepositorySettings;
use crate::statement::Aggregate;
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction};

/// Operation façade over a [`ConnectionFactory`].
///
/// Every operation takes an optional caller transaction. Without one, the
/// repository opens a connection for the call and releases it afterwards.
pub struct DbRepository<F: ConnectionFactory = SqliteConnectionFactory> {
    factory: F,
    settings: RepositorySettings,
}

impl DbRepository<SqliteConnectionFactory> {
    /// Builds a file-backed repository from configuration.
    pub fn from_config(config: &RepositoryConfig) -> Self {
        let factory = SqliteConnectionFactory::file(config.database_path.clone())
            .with_busy_timeout(config.busy_timeout());
        Self::with_settings(factory, RepositorySettings::from_config(config))
    }
}

impl<F: ConnectionFactory> DbRepository<F> {
    pub fn new(factory: F) -> Self {
        Self::with_settings(factory, RepositorySettings::default())
    }

    pub fn with_settings(factory: F, settings: RepositorySettings) -> Self {
        Self { factory, settings }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    /// Opens a caller-owned connection, e.g. to start a transaction on.
    pub fn create_connection(&self) -> RepoResult<Connection> {
        Ok(self.factory.create_connection()?)
    }

    pub async fn create_async_connection(&self) -> RepoResult<AsyncConnection> {
        Ok(self.factory.create_async_connection().await?)
    }

    fn with_connection<T>(
        &self,
        transaction: Option<&Transaction<'_>>,
        op: impl FnOnce(&Connection, &RepositorySettings) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let lease = ConnectionLease::acquire(&self.factory, transaction)?;
        op(&*lease, &self.settings)
    }

    pub fn insert(
        &self,
        table: &str,
        record: &Record,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.with_connection(transaction, |conn, settings| {
            ops::insert(conn, settings, Table::named(table), record, hints)
        })
    }

    pub fn insert_entity<T: Entity>(
        &self,
        entity: &T,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        let record = entity.to_record();
        self.with_connection(transaction, |conn, settings| {
            ops::insert(conn, settings, entity_table::<T>(), &record, hints)
        })
    }

    /// Inserts `records`, at most `batch_size` per statement
    /// (repository default when `None`).
    pub fn insert_all(
        &self,
        table: &str,
        records: &[Record],
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.with_connection(transaction, |conn, settings| {
            ops::insert_all(conn, settings, Table::named(table), records, batch_size, hints)
        })
    }

    pub fn insert_all_entities<T: Entity>(
        &self,
        entities: &[T],
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        let records = to_records(entities);
        self.with_connection(transaction, |conn, settings| {
            ops::insert_all(conn, settings, entity_table::<T>(), &records, batch_size, hints)
        })
    }

    pub fn update(
        &self,
        table: &str,
        record: &Record,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.with_connection(transaction, |conn, settings| {
            ops::update(conn, settings, Table::named(table), record, filter, hints)
        })
    }

    /// Updates the rows matched by `filter`, or the entity's own row when
    /// `filter` is `None`.
    pub fn update_entity<T: Entity>(
        &self,
        entity: &T,
        filter: Option<&Filter>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        let record = entity.to_record();
        let filter = entity_filter::<T>(&record, filter);
        self.with_connection(transaction, |conn, settings| {
            ops::update(conn, settings, entity_table::<T>(), &record, &filter, hints)
        })
    }

    /// Updates each record by `qualifiers` (the primary key when `None`).
    pub fn update_all(
        &self,
        table: &str,
        records: &[Record],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.with_connection(transaction, |conn, settings| {
            ops::update_all(
                conn,
                settings,
                Table::named(table),
                records,
                qualifiers,
                batch_size,
                hints,
            )
        })
    }

    pub fn update_all_entities<T: Entity>(
        &self,
        entities: &[T],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        let records = to_records(entities);
        self.with_connection(transaction, |conn, settings| {
            ops::update_all(
                conn,
                settings,
                entity_table::<T>(),
                &records,
                qualifiers,
                batch_size,
                hints,
            )
        })
    }

    pub fn delete(
        &self,
        table: &str,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.delete_in(Table::named(table), filter, hints, transaction)
    }

    pub(crate) fn delete_in(
        &self,
        table: Table<'_>,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.with_connection(transaction, |conn, settings| {
            ops::delete(conn, settings, table, filter, hints)
        })
    }

    /// Deletes the entity's row by primary key.
    pub fn delete_entity<T: Entity>(
        &self,
        entity: &T,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        let filter = Filter::Key(entity.key_value());
        self.with_connection(transaction, |conn, settings| {
            ops::delete(conn, settings, entity_table::<T>(), &filter, hints)
        })
    }

    pub fn delete_all(
        &self,
        table: &str,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.delete_all_in(Table::named(table), hints, transaction)
    }

    pub(crate) fn delete_all_in(
        &self,
        table: Table<'_>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.with_connection(transaction, |conn, settings| {
            ops::delete_all(conn, settings, table, hints)
        })
    }

    /// Updates the row matched by `qualifiers` (the primary key when `None`)
    /// or inserts `record`; returns the row's key.
    pub fn merge(
        &self,
        table: &str,
        record: &Record,
        qualifiers: Option<&[Field]>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.with_connection(transaction, |conn, settings| {
            ops::merge(conn, settings, Table::named(table), record, qualifiers, hints)
        })
    }

    pub fn merge_entity<T: Entity>(
        &self,
        entity: &T,
        qualifiers: Option<&[Field]>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        let record = entity.to_record();
        self.with_connection(transaction, |conn, settings| {
            ops::merge(conn, settings, entity_table::<T>(), &record, qualifiers, hints)
        })
    }

    pub fn merge_all(
        &self,
        table: &str,
        records: &[Record],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.with_connection(transaction, |conn, settings| {
            ops::merge_all(
                conn,
                settings,
                Table::named(table),
                records,
                qualifiers,
                batch_size,
                hints,
            )
        })
    }

    pub fn merge_all_entities<T: Entity>(
        &self,
        entities: &[T],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        let records = to_records(entities);
        self.with_connection(transaction, |conn, settings| {
            ops::merge_all(
                conn,
                settings,
                entity_table::<T>(),
                &records,
                qualifiers,
                batch_size,
                hints,
            )
        })
    }

    pub fn query(
        &self,
        table: &str,
        filter: &Filter,
        options: &QueryOptions,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<Record>> {
        self.with_connection(transaction, |conn, settings| {
            ops::query(conn, settings, Table::named(table), filter, options)
        })
    }

    pub fn query_all(
        &self,
        table: &str,
        options: &QueryOptions,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<Record>> {
        self.query(table, &Filter::All, options, transaction)
    }

    pub fn query_entities<T: Entity>(
        &self,
        filter: &Filter,
        options: &QueryOptions,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<T>> {
        let records = self.with_connection(transaction, |conn, settings| {
            ops::query(conn, settings, entity_table::<T>(), filter, options)
        })?;
        from_records(records)
    }

    /// Runs several queries on one connection; one row set per request.
    pub fn query_multiple(
        &self,
        requests: &[QueryRequest],
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<Vec<Record>>> {
        self.with_connection(transaction, |conn, settings| {
            ops::query_multiple(conn, settings, requests)
        })
    }

    pub fn batch_query(
        &self,
        table: &str,
        filter: &Filter,
        options: &BatchQueryOptions,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<Record>> {
        self.with_connection(transaction, |conn, settings| {
            ops::batch_query(conn, settings, Table::named(table), filter, options)
        })
    }

    pub fn batch_query_entities<T: Entity>(
        &self,
        filter: &Filter,
        options: &BatchQueryOptions,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<T>> {
        let records = self.with_connection(transaction, |conn, settings| {
            ops::batch_query(conn, settings, entity_table::<T>(), filter, options)
        })?;
        from_records(records)
    }

    pub fn count(
        &self,
        table: &str,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<i64> {
        self.count_in(Table::named(table), filter, hints, transaction)
    }

    pub(crate) fn count_in(
        &self,
        table: Table<'_>,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<i64> {
        self.with_connection(transaction, |conn, settings| {
            ops::count(conn, settings, table, filter, hints)
        })
    }

    pub fn count_all(
        &self,
        table: &str,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<i64> {
        self.count(table, &Filter::All, hints, transaction)
    }

    pub fn sum(
        &self,
        table: &str,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.aggregate_in(
            Table::named(table),
            Aggregate::Sum,
            field,
            filter,
            hints,
            transaction,
        )
    }

    pub fn sum_all(
        &self,
        table: &str,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.sum(table, field, &Filter::All, hints, transaction)
    }

    pub fn max(
        &self,
        table: &str,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.aggregate_in(
            Table::named(table),
            Aggregate::Max,
            field,
            filter,
            hints,
            transaction,
        )
    }

    pub fn max_all(
        &self,
        table: &str,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.max(table, field, &Filter::All, hints, transaction)
    }

    pub fn min(
        &self,
        table: &str,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.aggregate_in(
            Table::named(table),
            Aggregate::Min,
            field,
            filter,
            hints,
            transaction,
        )
    }

    pub fn min_all(
        &self,
        table: &str,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.min(table, field, &Filter::All, hints, transaction)
    }

    pub fn average(
        &self,
        table: &str,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.aggregate_in(
            Table::named(table),
            Aggregate::Average,
            field,
            filter,
            hints,
            transaction,
        )
    }

    pub fn average_all(
        &self,
        table: &str,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.average(table, field, &Filter::All, hints, transaction)
    }

    pub(crate) fn aggregate_in(
        &self,
        table: Table<'_>,
        aggregate: Aggregate,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.with_connection(transaction, |conn, settings| {
            ops::aggregate(
                conn,
                settings,
                table,
                aggregate,
                Some(field),
                filter,
                hints,
            )
        })
    }

    pub fn exists(
        &self,
        table: &str,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<bool> {
        self.exists_in(Table::named(table), filter, hints, transaction)
    }

    pub(crate) fn exists_in(
        &self,
        table: Table<'_>,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<bool> {
        self.with_connection(transaction, |conn, settings| {
            ops::exists(conn, settings, table, filter, hints)
        })
    }

    /// Deletes every row of `table` and resets its autoincrement counter.
    pub fn truncate(
        &self,
        table: &str,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.truncate_in(Table::named(table), transaction)
    }

    pub(crate) fn truncate_in(
        &self,
        table: Table<'_>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.with_connection(transaction, |conn, settings| {
            ops::truncate(conn, settings, table)
        })
    }

    pub fn execute_non_query(
        &self,
        sql: &str,
        params: &[Value],
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.with_connection(transaction, |conn, settings| {
            ops::execute_non_query(conn, settings, sql, params)
        })
    }

    pub fn execute_scalar(
        &self,
        sql: &str,
        params: &[Value],
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.with_connection(transaction, |conn, settings| {
            ops::execute_scalar(conn, settings, sql, params)
        })
    }

    pub fn execute_query(
        &self,
        sql: &str,
        params: &[Value],
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<Record>> {
        self.with_connection(transaction, |conn, settings| {
            ops::execute_query(conn, settings, sql, params)
        })
    }
}

pub(super) fn entity_table<T: Entity>() -> Table<'static> {
    Table::with_primary_key(T::TABLE, T::PRIMARY_KEY)
}

/// Explicit filter, or the primary key value carried by `record`.
pub(super) fn entity_filter<T: Entity>(record: &Record, filter: Option<&Filter>) -> Filter {
    match filter {
        Some(filter) => filter.clone(),
        None => Filter::Key(record.get(T::PRIMARY_KEY).cloned().unwrap_or(Value::Null)),
    }
}

pub(super) fn to_records<T: Entity>(entities: &[T]) -> Vec<Record> {
    entities.iter().map(Entity::to_record).collect()
}

pub(super) fn from_records<T: Entity>(records: Vec<Record>) -> RepoResult<Vec<T>> {
    records.into_iter().map(T::from_record).collect()
}
