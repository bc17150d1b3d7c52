//! Async repository façade.
//!
//! Same operation families as the blocking façade. Each call clones its
//! arguments into the delegated operation, which runs on the connection's
//! worker thread; the cancellation token rides along in the call's settings.

use super::db_repository::{entity_filter, entity_table, from_records, to_records, DbRepository};
use crate::db::{AsyncConnectionLease, AsyncTransaction, ConnectionFactory};
use crate::model::field::Field;
use crate::model::options::{BatchQueryOptions, QueryOptions, QueryRequest};
use crate::model::query::Filter;
use crate::model::record::{Entity, Record};
use crate::ops::{self, Table};
use crate::repo::error::RepoResult;
use crate::repo::settings::RepositorySettings;
use crate::statement::Aggregate;
use rusqlite::types::Value;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn owned_fields(fields: Option<&[Field]>) -> Option<Vec<Field>> {
    fields.map(<[Field]>::to_vec)
}

impl<F: ConnectionFactory> DbRepository<F> {
    async fn run_async<T, Op>(
        &self,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
        op: Op,
    ) -> RepoResult<T>
    where
        Op: FnOnce(&Connection, &RepositorySettings) -> RepoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let lease = AsyncConnectionLease::acquire(self.factory(), transaction).await?;
        let settings = self.settings().clone().with_cancellation(cancellation.clone());
        let result = ops::run_async(&lease.connection(), cancellation, move |conn| {
            op(conn, &settings)
        })
        .await;
        lease.release().await;
        result
    }

    pub async fn insert_async(
        &self,
        table: &str,
        record: &Record,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let (table, record, hints) = (table.to_string(), record.clone(), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::insert(conn, settings, Table::named(&table), &record, hints.as_deref())
        })
        .await
    }

    pub async fn insert_entity_async<T: Entity>(
        &self,
        entity: &T,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let (record, hints) = (entity.to_record(), owned(hints));
        let table = entity_table::<T>();
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::insert(conn, settings, table, &record, hints.as_deref())
        })
        .await
    }

    pub async fn insert_all_async(
        &self,
        table: &str,
        records: &[Record],
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (table, records, hints) = (table.to_string(), records.to_vec(), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::insert_all(
                conn,
                settings,
                Table::named(&table),
                &records,
                batch_size,
                hints.as_deref(),
            )
        })
        .await
    }

    pub async fn insert_all_entities_async<T: Entity>(
        &self,
        entities: &[T],
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (records, hints) = (to_records(entities), owned(hints));
        let table = entity_table::<T>();
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::insert_all(
                conn,
                settings,
                table,
                &records,
                batch_size,
                hints.as_deref(),
            )
        })
        .await
    }

    pub async fn update_async(
        &self,
        table: &str,
        record: &Record,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (table, record, filter, hints) =
            (table.to_string(), record.clone(), filter.clone(), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::update(
                conn,
                settings,
                Table::named(&table),
                &record,
                &filter,
                hints.as_deref(),
            )
        })
        .await
    }

    pub async fn update_entity_async<T: Entity>(
        &self,
        entity: &T,
        filter: Option<&Filter>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let record = entity.to_record();
        let filter = entity_filter::<T>(&record, filter);
        let hints = owned(hints);
        let table = entity_table::<T>();
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::update(
                conn,
                settings,
                table,
                &record,
                &filter,
                hints.as_deref(),
            )
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_all_async(
        &self,
        table: &str,
        records: &[Record],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (table, records) = (table.to_string(), records.to_vec());
        let (qualifiers, hints) = (owned_fields(qualifiers), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::update_all(
                conn,
                settings,
                Table::named(&table),
                &records,
                qualifiers.as_deref(),
                batch_size,
                hints.as_deref(),
            )
        })
        .await
    }

    pub async fn update_all_entities_async<T: Entity>(
        &self,
        entities: &[T],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let records = to_records(entities);
        let (qualifiers, hints) = (owned_fields(qualifiers), owned(hints));
        let table = entity_table::<T>();
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::update_all(
                conn,
                settings,
                table,
                &records,
                qualifiers.as_deref(),
                batch_size,
                hints.as_deref(),
            )
        })
        .await
    }

    pub async fn delete_async(
        &self,
        table: &str,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.delete_in_async(Table::named(table), filter, hints, transaction, cancellation)
            .await
    }

    pub(crate) async fn delete_in_async(
        &self,
        table: Table<'_>,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (table, filter, hints) = (OwnedTable::from(table), filter.clone(), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::delete(conn, settings, table.as_table(), &filter, hints.as_deref())
        })
        .await
    }

    pub async fn delete_entity_async<T: Entity>(
        &self,
        entity: &T,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (filter, hints) = (Filter::Key(entity.key_value()), owned(hints));
        let table = entity_table::<T>();
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::delete(conn, settings, table, &filter, hints.as_deref())
        })
        .await
    }

    pub async fn delete_all_async(
        &self,
        table: &str,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.delete_all_in_async(Table::named(table), hints, transaction, cancellation)
            .await
    }

    pub(crate) async fn delete_all_in_async(
        &self,
        table: Table<'_>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (table, hints) = (OwnedTable::from(table), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::delete_all(conn, settings, table.as_table(), hints.as_deref())
        })
        .await
    }

    pub async fn merge_async(
        &self,
        table: &str,
        record: &Record,
        qualifiers: Option<&[Field]>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let (table, record) = (table.to_string(), record.clone());
        let (qualifiers, hints) = (owned_fields(qualifiers), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::merge(
                conn,
                settings,
                Table::named(&table),
                &record,
                qualifiers.as_deref(),
                hints.as_deref(),
            )
        })
        .await
    }

    pub async fn merge_entity_async<T: Entity>(
        &self,
        entity: &T,
        qualifiers: Option<&[Field]>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let record = entity.to_record();
        let (qualifiers, hints) = (owned_fields(qualifiers), owned(hints));
        let table = entity_table::<T>();
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::merge(
                conn,
                settings,
                table,
                &record,
                qualifiers.as_deref(),
                hints.as_deref(),
            )
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn merge_all_async(
        &self,
        table: &str,
        records: &[Record],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (table, records) = (table.to_string(), records.to_vec());
        let (qualifiers, hints) = (owned_fields(qualifiers), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::merge_all(
                conn,
                settings,
                Table::named(&table),
                &records,
                qualifiers.as_deref(),
                batch_size,
                hints.as_deref(),
            )
        })
        .await
    }

    pub async fn merge_all_entities_async<T: Entity>(
        &self,
        entities: &[T],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let records = to_records(entities);
        let (qualifiers, hints) = (owned_fields(qualifiers), owned(hints));
        let table = entity_table::<T>();
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::merge_all(
                conn,
                settings,
                table,
                &records,
                qualifiers.as_deref(),
                batch_size,
                hints.as_deref(),
            )
        })
        .await
    }

    pub async fn query_async(
        &self,
        table: &str,
        filter: &Filter,
        options: &QueryOptions,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<Record>> {
        let (table, filter, options) = (table.to_string(), filter.clone(), options.clone());
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::query(conn, settings, Table::named(&table), &filter, &options)
        })
        .await
    }

    pub async fn query_all_async(
        &self,
        table: &str,
        options: &QueryOptions,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<Record>> {
        self.query_async(table, &Filter::All, options, transaction, cancellation)
            .await
    }

    pub async fn query_entities_async<T: Entity>(
        &self,
        filter: &Filter,
        options: &QueryOptions,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        let (filter, options) = (filter.clone(), options.clone());
        let table = entity_table::<T>();
        let records = self
            .run_async(transaction, cancellation, move |conn, settings| {
                ops::query(conn, settings, table, &filter, &options)
            })
            .await?;
        from_records(records)
    }

    pub async fn query_multiple_async(
        &self,
        requests: &[QueryRequest],
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<Vec<Record>>> {
        let requests = requests.to_vec();
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::query_multiple(conn, settings, &requests)
        })
        .await
    }

    pub async fn batch_query_async(
        &self,
        table: &str,
        filter: &Filter,
        options: &BatchQueryOptions,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<Record>> {
        let (table, filter, options) = (table.to_string(), filter.clone(), options.clone());
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::batch_query(conn, settings, Table::named(&table), &filter, &options)
        })
        .await
    }

    pub async fn batch_query_entities_async<T: Entity>(
        &self,
        filter: &Filter,
        options: &BatchQueryOptions,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        let (filter, options) = (filter.clone(), options.clone());
        let table = entity_table::<T>();
        let records = self
            .run_async(transaction, cancellation, move |conn, settings| {
                ops::batch_query(conn, settings, table, &filter, &options)
            })
            .await?;
        from_records(records)
    }

    pub async fn count_async(
        &self,
        table: &str,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<i64> {
        self.count_in_async(Table::named(table), filter, hints, transaction, cancellation)
            .await
    }

    pub(crate) async fn count_in_async(
        &self,
        table: Table<'_>,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<i64> {
        let (table, filter, hints) = (OwnedTable::from(table), filter.clone(), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::count(conn, settings, table.as_table(), &filter, hints.as_deref())
        })
        .await
    }

    pub async fn count_all_async(
        &self,
        table: &str,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<i64> {
        self.count_async(table, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn sum_async(
        &self,
        table: &str,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let request = AggregateRequest::new(Table::named(table), Aggregate::Sum, field, filter, hints);
        self.aggregate_async(request, transaction, cancellation).await
    }

    pub async fn sum_all_async(
        &self,
        table: &str,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.sum_async(table, field, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn max_async(
        &self,
        table: &str,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let request = AggregateRequest::new(Table::named(table), Aggregate::Max, field, filter, hints);
        self.aggregate_async(request, transaction, cancellation).await
    }

    pub async fn max_all_async(
        &self,
        table: &str,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.max_async(table, field, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn min_async(
        &self,
        table: &str,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let request = AggregateRequest::new(Table::named(table), Aggregate::Min, field, filter, hints);
        self.aggregate_async(request, transaction, cancellation).await
    }

    pub async fn min_all_async(
        &self,
        table: &str,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.min_async(table, field, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn average_async(
        &self,
        table: &str,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let request =
            AggregateRequest::new(Table::named(table), Aggregate::Average, field, filter, hints);
        self.aggregate_async(request, transaction, cancellation).await
    }

    pub async fn average_all_async(
        &self,
        table: &str,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.average_async(table, field, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub(crate) async fn aggregate_async(
        &self,
        request: AggregateRequest,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::aggregate(
                conn,
                settings,
                request.table.as_table(),
                request.aggregate,
                Some(&request.field),
                &request.filter,
                request.hints.as_deref(),
            )
        })
        .await
    }

    pub async fn exists_async(
        &self,
        table: &str,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<bool> {
        self.exists_in_async(Table::named(table), filter, hints, transaction, cancellation)
            .await
    }

    pub(crate) async fn exists_in_async(
        &self,
        table: Table<'_>,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<bool> {
        let (table, filter, hints) = (OwnedTable::from(table), filter.clone(), owned(hints));
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::exists(conn, settings, table.as_table(), &filter, hints.as_deref())
        })
        .await
    }

    pub async fn truncate_async(
        &self,
        table: &str,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.truncate_in_async(Table::named(table), transaction, cancellation)
            .await
    }

    pub(crate) async fn truncate_in_async(
        &self,
        table: Table<'_>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let table = OwnedTable::from(table);
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::truncate(conn, settings, table.as_table())
        })
        .await
    }

    pub async fn execute_non_query_async(
        &self,
        sql: &str,
        params: &[Value],
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::execute_non_query(conn, settings, &sql, &params)
        })
        .await
    }

    pub async fn execute_scalar_async(
        &self,
        sql: &str,
        params: &[Value],
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::execute_scalar(conn, settings, &sql, &params)
        })
        .await
    }

    pub async fn execute_query_async(
        &self,
        sql: &str,
        params: &[Value],
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<Record>> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.run_async(transaction, cancellation, move |conn, settings| {
            ops::execute_query(conn, settings, &sql, &params)
        })
        .await
    }
}

/// Owned copy of a [`Table`] that can move onto the worker thread.
struct OwnedTable {
    name: String,
    primary_key: Option<String>,
}

impl OwnedTable {
    fn as_table(&self) -> Table<'_> {
        Table {
            name: &self.name,
            primary_key: self.primary_key.as_deref(),
        }
    }
}

impl From<Table<'_>> for OwnedTable {
    fn from(table: Table<'_>) -> Self {
        Self {
            name: table.name.to_string(),
            primary_key: owned(table.primary_key),
        }
    }
}

/// Owned arguments of one aggregate call.
pub(crate) struct AggregateRequest {
    table: OwnedTable,
    aggregate: Aggregate,
    field: Field,
    filter: Filter,
    hints: Option<String>,
}

impl AggregateRequest {
    pub(crate) fn new(
        table: Table<'_>,
        aggregate: Aggregate,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
    ) -> Self {
        Self {
            table: OwnedTable::from(table),
            aggregate,
            field: field.clone(),
            filter: filter.clone(),
            hints: owned(hints),
        }
    }
}
