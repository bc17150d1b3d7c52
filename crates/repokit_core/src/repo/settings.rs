//! Explicit repository settings.
//!
//! Every façade call forwards one [`RepositorySettings`] value to the
//! delegated operations; nothing is read from process-wide state.

use crate::cache::{Cache, DEFAULT_CACHE_EXPIRATION};
use crate::config::RepositoryConfig;
use crate::model::record::DEFAULT_BATCH_OPERATION_SIZE;
use crate::statement::{SqliteStatementBuilder, StatementBuilder};
use crate::trace::Trace;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Collaborators and defaults shared by every operation of one repository.
#[derive(Clone)]
pub struct RepositorySettings {
    /// Per-statement timeout; `None` lets statements run unbounded.
    pub command_timeout: Option<Duration>,
    pub trace: Option<Arc<dyn Trace>>,
    pub statement_builder: Arc<dyn StatementBuilder>,
    pub cache: Option<Arc<dyn Cache>>,
    pub cache_expiration: Duration,
    /// Rows per statement when a batch call passes no explicit size.
    pub batch_size: usize,
    /// Token of the async call in progress; checked between and during statements.
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            command_timeout: None,
            trace: None,
            statement_builder: Arc::new(SqliteStatementBuilder),
            cache: None,
            cache_expiration: DEFAULT_CACHE_EXPIRATION,
            batch_size: DEFAULT_BATCH_OPERATION_SIZE,
            cancellation: None,
        }
    }
}

impl RepositorySettings {
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self {
            command_timeout: config.command_timeout(),
            cache_expiration: config.cache_expiration(),
            batch_size: config.batch_size.max(1),
            ..Self::default()
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn with_trace(mut self, trace: Arc<dyn Trace>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_statement_builder(mut self, builder: Arc<dyn StatementBuilder>) -> Self {
        self.statement_builder = builder;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_expiration(mut self, expiration: Duration) -> Self {
        self.cache_expiration = expiration;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub(crate) fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn resolve_batch_size(&self, batch_size: Option<usize>) -> usize {
        batch_size.unwrap_or(self.batch_size).max(1)
    }
}

impl Debug for RepositorySettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositorySettings")
            .field("command_timeout", &self.command_timeout)
            .field("trace", &self.trace.is_some())
            .field("cache", &self.cache.is_some())
            .field("cache_expiration", &self.cache_expiration)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
