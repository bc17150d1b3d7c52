//! Query, batch query, aggregate and existence checks.

use super::execute::{query as query_rows, scalar, Table};
use crate::model::field::Field;
use crate::model::options::{BatchQueryOptions, QueryOptions, QueryRequest};
use crate::model::query::Filter;
use crate::model::record::Record;
use crate::repo::error::RepoResult;
use crate::repo::settings::RepositorySettings;
use crate::statement::{Aggregate, QuerySpec};
use log::debug;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::Arc;

/// Rows of `table` matching `filter`.
///
/// With a cache key and a configured cache, a cached result is returned
/// without touching the database; a fresh result is stored under the key.
pub fn query(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    filter: &Filter,
    options: &QueryOptions,
) -> RepoResult<Vec<Record>> {
    let cache = match (&settings.cache, &options.cache_key) {
        (Some(cache), Some(key)) => Some((cache, key.as_str())),
        _ => None,
    };
    if let Some((cache, key)) = cache {
        if let Some(rows) = cache.get(key) {
            debug!("event=query_cache module=ops status=hit key={key}");
            return Ok((*rows).clone());
        }
    }

    let filter = table.resolve(conn, filter)?;
    let spec = QuerySpec {
        fields: options.fields.as_deref(),
        filter: filter.as_ref(),
        order_by: &options.order_by,
        top: options.top,
        hints: options.hints.as_deref(),
        ..QuerySpec::new(table.name)
    };
    let statement = settings.statement_builder.create_query(&spec)?;
    let rows = query_rows(conn, settings, "query", statement)?;

    if let Some((cache, key)) = cache {
        let expiration = options.cache_expiration.unwrap_or(settings.cache_expiration);
        cache.add(key, Arc::new(rows.clone()), expiration);
        debug!(
            "event=query_cache module=ops status=store key={key} rows={} expiration_secs={}",
            rows.len(),
            expiration.as_secs()
        );
    }
    Ok(rows)
}

/// Runs each request in order on the same connection.
pub fn query_multiple(
    conn: &Connection,
    settings: &RepositorySettings,
    requests: &[QueryRequest],
) -> RepoResult<Vec<Vec<Record>>> {
    requests
        .iter()
        .map(|request| {
            query(
                conn,
                settings,
                Table::named(&request.table),
                &request.filter,
                &request.options,
            )
        })
        .collect()
}

/// One page of rows under the requested ordering.
pub fn batch_query(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    filter: &Filter,
    options: &BatchQueryOptions,
) -> RepoResult<Vec<Record>> {
    let filter = table.resolve(conn, filter)?;
    let spec = QuerySpec {
        fields: options.fields.as_deref(),
        filter: filter.as_ref(),
        order_by: &options.order_by,
        hints: options.hints.as_deref(),
        ..QuerySpec::new(table.name)
    };
    let statement = settings.statement_builder.create_batch_query(
        &spec,
        options.page,
        options.rows_per_batch,
    )?;
    query_rows(conn, settings, "batch_query", statement)
}

/// Single aggregate value; `NULL` when no row matched (except for counts).
pub fn aggregate(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    aggregate: Aggregate,
    field: Option<&Field>,
    filter: &Filter,
    hints: Option<&str>,
) -> RepoResult<Value> {
    let filter = table.resolve(conn, filter)?;
    let statement = settings.statement_builder.create_aggregate(
        table.name,
        aggregate,
        field,
        filter.as_ref(),
        hints,
    )?;
    scalar(conn, settings, trace_key(aggregate), statement)
}

/// Row count; a `NULL` result from a custom builder counts as zero.
pub fn count(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    filter: &Filter,
    hints: Option<&str>,
) -> RepoResult<i64> {
    let value = aggregate(conn, settings, table, Aggregate::Count, None, filter, hints)?;
    Ok(match value {
        Value::Integer(count) => count,
        Value::Real(count) => count as i64,
        _ => 0,
    })
}

pub fn exists(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    filter: &Filter,
    hints: Option<&str>,
) -> RepoResult<bool> {
    let filter = table.resolve(conn, filter)?;
    let statement = settings
        .statement_builder
        .create_exists(table.name, filter.as_ref(), hints)?;
    Ok(scalar(conn, settings, "exists", statement)? != Value::Null)
}

fn trace_key(aggregate: Aggregate) -> &'static str {
    match aggregate {
        Aggregate::Count => "count",
        Aggregate::Sum => "sum",
        Aggregate::Max => "max",
        Aggregate::Min => "min",
        Aggregate::Average => "average",
    }
}
