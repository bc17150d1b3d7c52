//! Per-call options of the read families.

use crate::model::field::{Field, OrderField};
use crate::model::query::Filter;
use std::time::Duration;

/// Projection, ordering, limit, hints and caching for query operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// `None` selects every column.
    pub fields: Option<Vec<Field>>,
    pub order_by: Vec<OrderField>,
    pub top: Option<u32>,
    pub hints: Option<String>,
    /// Enables result caching under this key when the repository has a cache.
    pub cache_key: Option<String>,
    /// Overrides the repository cache expiration for this call.
    pub cache_expiration: Option<Duration>,
}

impl QueryOptions {
    pub fn ordered_by(order_by: Vec<OrderField>) -> Self {
        Self {
            order_by,
            ..Self::default()
        }
    }

    pub fn cached(cache_key: impl Into<String>) -> Self {
        Self {
            cache_key: Some(cache_key.into()),
            ..Self::default()
        }
    }
}

/// Paging parameters for batch queries.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQueryOptions {
    /// Zero-based page index.
    pub page: u32,
    pub rows_per_batch: u32,
    /// Must not be empty; pages are only stable under a total order.
    pub order_by: Vec<OrderField>,
    pub fields: Option<Vec<Field>>,
    pub hints: Option<String>,
}

impl BatchQueryOptions {
    pub fn new(page: u32, rows_per_batch: u32, order_by: Vec<OrderField>) -> Self {
        Self {
            page,
            rows_per_batch,
            order_by,
            fields: None,
            hints: None,
        }
    }
}

/// One query of a `query_multiple` call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: String,
    pub filter: Filter,
    pub options: QueryOptions,
}

impl QueryRequest {
    pub fn new(table: impl Into<String>, filter: Filter) -> Self {
        Self {
            table: table.into(),
            filter,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}
