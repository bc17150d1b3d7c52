//! Traced, time-bounded statement execution.

use crate::db::AsyncConnection;
use crate::model::query::{Filter, QueryGroup};
use crate::model::record::Record;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::settings::RepositorySettings;
use crate::statement::{quote_identifier, Statement};
use crate::trace::{CancellableTraceLog, TraceLog};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// VM instructions between two interruption checks.
const PROGRESS_HANDLER_STEPS: i32 = 1_000;

/// Table addressed by one operation.
///
/// `primary_key` is known up front for typed operations; table-name
/// operations leave it unset and resolve it from the schema on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table<'a> {
    pub name: &'a str,
    pub primary_key: Option<&'a str>,
}

impl<'a> Table<'a> {
    pub fn named(name: &'a str) -> Self {
        Self {
            name,
            primary_key: None,
        }
    }

    pub fn with_primary_key(name: &'a str, primary_key: &'a str) -> Self {
        Self {
            name,
            primary_key: Some(primary_key),
        }
    }

    /// Primary key column, read from `PRAGMA table_info` when not known.
    pub(crate) fn primary_key(&self, conn: &Connection) -> RepoResult<Option<String>> {
        match self.primary_key {
            Some(key) => Ok(Some(key.to_string())),
            None => primary_key_of(conn, self.name),
        }
    }

    /// Resolves `filter`, looking the primary key up only for key filters.
    pub(crate) fn resolve(
        &self,
        conn: &Connection,
        filter: &Filter,
    ) -> RepoResult<Option<QueryGroup>> {
        if filter.needs_primary_key() {
            let key = self.primary_key(conn)?;
            filter.to_group(self.name, key.as_deref())
        } else {
            filter.to_group(self.name, self.primary_key)
        }
    }
}

/// First primary key column of `table`, `None` for rowid-only tables.
pub fn primary_key_of(conn: &Connection, table: &str) -> RepoResult<Option<String>> {
    let sql = format!("PRAGMA table_info({});", quote_identifier(table)?);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let position: i64 = row.get("pk")?;
        if position == 1 {
            return Ok(Some(row.get("name")?));
        }
    }
    Ok(None)
}

/// Runs `statement` for its affected row count.
pub(crate) fn execute(
    conn: &Connection,
    settings: &RepositorySettings,
    key: &str,
    statement: Statement,
) -> RepoResult<usize> {
    traced(conn, settings, key, statement, |conn, statement| {
        let mut prepared = conn.prepare_cached(&statement.sql)?;
        prepared.execute(params_from_iter(statement.params.iter()))
    })
}

/// Runs `statement` and maps every row into a [`Record`].
pub(crate) fn query(
    conn: &Connection,
    settings: &RepositorySettings,
    key: &str,
    statement: Statement,
) -> RepoResult<Vec<Record>> {
    traced(conn, settings, key, statement, |conn, statement| {
        let mut prepared = conn.prepare_cached(&statement.sql)?;
        let columns: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = prepared.query(params_from_iter(statement.params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), row.get::<_, Value>(index)?);
            }
            records.push(record);
        }
        Ok(records)
    })
}

/// First column of the first row, `NULL` when the statement yields no rows.
pub(crate) fn scalar(
    conn: &Connection,
    settings: &RepositorySettings,
    key: &str,
    statement: Statement,
) -> RepoResult<Value> {
    traced(conn, settings, key, statement, |conn, statement| {
        let mut prepared = conn.prepare_cached(&statement.sql)?;
        let mut rows = prepared.query(params_from_iter(statement.params.iter()))?;
        match rows.next()? {
            Some(row) => row.get::<_, Value>(0),
            None => Ok(Value::Null),
        }
    })
}

/// Runs `work` inside a transaction unless the caller already opened one.
///
/// Multi-statement operations use this so a failure leaves no partial
/// writes behind; a caller transaction keeps full control of commit.
pub(crate) fn atomically<T>(
    conn: &Connection,
    work: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T> {
    if !conn.is_autocommit() {
        return work();
    }
    let transaction = conn.unchecked_transaction()?;
    let value = work()?;
    transaction.commit()?;
    Ok(value)
}

fn traced<T>(
    conn: &Connection,
    settings: &RepositorySettings,
    key: &str,
    statement: Statement,
    run: impl FnOnce(&Connection, &Statement) -> rusqlite::Result<T>,
) -> RepoResult<T> {
    if settings.is_cancelled() {
        debug!("event=statement_cancel module=ops key={key} reason=token");
        return Err(RepoError::Cancelled);
    }

    let mut session = None;
    if let Some(trace) = &settings.trace {
        let mut log = CancellableTraceLog::new(TraceLog::new(
            key,
            statement.sql.as_str(),
            statement.params.clone(),
        ));
        trace.before_execution(&mut log);
        if log.is_cancelled() {
            debug!("event=statement_cancel module=ops key={key} reason=trace");
            return Err(RepoError::TraceCancelled {
                key: key.to_string(),
            });
        }
        session = Some(log.log);
    }

    let started_at = Instant::now();
    let result = {
        let _guard = InterruptGuard::arm(conn, settings);
        run(conn, &statement)
    };
    let elapsed = started_at.elapsed();

    if let (Some(trace), Some(mut log)) = (&settings.trace, session) {
        log.elapsed = Some(elapsed);
        log.succeeded = Some(result.is_ok());
        trace.after_execution(&log);
    }

    match &result {
        Ok(_) => debug!(
            "event=statement_execute module=ops status=ok key={key} params={} duration_ms={}",
            statement.params.len(),
            elapsed.as_millis()
        ),
        Err(err) => debug!(
            "event=statement_execute module=ops status=error key={key} duration_ms={} error={err}",
            elapsed.as_millis()
        ),
    }

    match result.map_err(RepoError::from) {
        Err(err) if err.is_interrupted() && settings.is_cancelled() => Err(RepoError::Cancelled),
        other => other,
    }
}

/// Stop condition polled by the progress handler.
struct Interruption {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl Interruption {
    fn due(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
            || self
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Interrupts the running statement once its deadline passes or its
/// cancellation token fires.
///
/// The handler lives only for one statement, so other work on a shared
/// transaction connection is never interrupted.
struct InterruptGuard<'c> {
    conn: &'c Connection,
    armed: bool,
}

impl<'c> InterruptGuard<'c> {
    fn arm(conn: &'c Connection, settings: &RepositorySettings) -> Self {
        let interruption = Interruption {
            deadline: settings.command_timeout.map(|timeout| Instant::now() + timeout),
            cancellation: settings.cancellation.clone(),
        };
        let armed = interruption.deadline.is_some() || interruption.cancellation.is_some();
        if armed {
            let interruption = AssertUnwindSafe(interruption);
            conn.progress_handler(PROGRESS_HANDLER_STEPS, Some(move || interruption.due()));
        }
        Self { conn, armed }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const ABANDONED: u8 = 2;

/// Runs a blocking operation on `conn`'s worker thread.
///
/// `op` must run its statements with settings carrying `cancellation`, so a
/// statement in flight stops at the next progress check once the token
/// fires. An operation still queued behind other work on the connection is
/// abandoned and never runs.
///
/// # Errors
/// - [`RepoError::Cancelled`] when the token fired before `op` started or
///   interrupted one of its statements. A completed `op` keeps its result.
pub async fn run_async<T, Op>(
    conn: &AsyncConnection,
    cancellation: &CancellationToken,
    op: Op,
) -> RepoResult<T>
where
    Op: FnOnce(&Connection) -> RepoResult<T> + Send + 'static,
    T: Send + 'static,
{
    if cancellation.is_cancelled() {
        return Err(RepoError::Cancelled);
    }

    let state = Arc::new(AtomicU8::new(PENDING));
    let worker_state = Arc::clone(&state);
    let token = cancellation.clone();
    let call = conn.call(move |conn| {
        let claimed = worker_state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !claimed || token.is_cancelled() {
            return Ok(Err(RepoError::Cancelled));
        }
        Ok(op(conn))
    });
    tokio::pin!(call);

    tokio::select! {
        biased;
        _ = cancellation.cancelled() => {}
        result = &mut call => return result?,
    }

    if state
        .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        debug!("event=operation_cancel module=ops status=abandoned");
        return Err(RepoError::Cancelled);
    }
    let result = call.await?;
    if let Err(err) = &result {
        debug!("event=operation_cancel module=ops status=stopped error={err}");
    }
    result
}
