//! Connection factory collaborator and its SQLite implementation.
//!
//! # Responsibility
//! - Open file or shared in-memory SQLite connections, blocking or async.
//! - Configure connection pragmas before handing a connection out.
//! - Close connections handed back by the repository.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and the configured busy timeout.
//! - No pooling: every `create_*` call opens a fresh connection.

use super::{DbError, DbResult};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Async connection handle; statements run on a dedicated background thread.
pub type AsyncConnection = tokio_rusqlite::Connection;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates and releases connections on behalf of a repository.
///
/// Implementations decide where connections come from. The repository only
/// guarantees that every connection it obtained here is handed back through
/// the matching `release_*` method.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    fn create_connection(&self) -> DbResult<Connection>;

    /// Closes a connection previously returned by [`Self::create_connection`].
    ///
    /// Close failures are logged; they cannot reach the caller because release
    /// runs from `Drop`.
    fn release_connection(&self, conn: Connection) {
        if let Err((_, err)) = conn.close() {
            warn!("event=connection_close module=db status=error mode=sync error={err}");
        }
    }

    async fn create_async_connection(&self) -> DbResult<AsyncConnection>;

    async fn release_async_connection(&self, conn: AsyncConnection) {
        if let Err(err) = conn.close().await {
            warn!("event=connection_close module=db status=error mode=async error={err}");
        }
    }
}

/// Where a [`SqliteConnectionFactory`] opens its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    File(PathBuf),
    /// Named in-memory database shared by every connection of the factory.
    SharedMemory(String),
}

impl DatabaseTarget {
    fn open_path(&self) -> String {
        match self {
            Self::File(path) => path.to_string_lossy().into_owned(),
            Self::SharedMemory(name) => format!("file:{name}?mode=memory&cache=shared"),
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::SharedMemory(_) => "memory",
        }
    }
}

/// Opens a new SQLite connection per request.
pub struct SqliteConnectionFactory {
    target: DatabaseTarget,
    busy_timeout: Duration,
    // Keeps a shared in-memory database alive between owned connections.
    _anchor: Option<Mutex<Connection>>,
}

impl SqliteConnectionFactory {
    /// Factory for a database file; the file is created on first open.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: DatabaseTarget::File(path.into()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            _anchor: None,
        }
    }

    /// Factory for a named in-memory database.
    ///
    /// Opens an anchor connection immediately so the database survives while
    /// the factory is alive, even when no repository call is in flight.
    pub fn shared_memory(name: &str) -> DbResult<Self> {
        let target = DatabaseTarget::SharedMemory(name.to_string());
        let anchor = Connection::open(target.open_path())?;
        Ok(Self {
            target,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            _anchor: Some(Mutex::new(anchor)),
        })
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }
}

#[async_trait]
impl ConnectionFactory for SqliteConnectionFactory {
    /// Opens a blocking connection and applies connection pragmas.
    ///
    /// # Side effects
    /// - Emits `db_open` logging events with duration and status.
    fn create_connection(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        let mode = self.target.mode();
        debug!("event=db_open module=db status=start mode={mode}");

        let result = Connection::open(self.target.open_path())
            .map_err(DbError::from)
            .and_then(|conn| {
                configure_connection(&conn, self.busy_timeout)?;
                Ok(conn)
            });

        log_open_result(&result, mode, started_at);
        result
    }

    async fn create_async_connection(&self) -> DbResult<AsyncConnection> {
        let started_at = Instant::now();
        let mode = self.target.mode();
        debug!("event=db_open module=db status=start mode={mode} async=true");

        let busy_timeout = self.busy_timeout;
        let result = match AsyncConnection::open(self.target.open_path()).await {
            Ok(conn) => {
                let configured = conn
                    .call(move |conn| Ok(configure_connection(conn, busy_timeout)))
                    .await;
                match configured {
                    Ok(Ok(())) => Ok(conn),
                    Ok(Err(err)) => Err(err),
                    Err(err) => Err(DbError::from(err)),
                }
            }
            Err(err) => Err(DbError::from(err)),
        };

        log_open_result(&result, mode, started_at);
        result
    }
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

fn log_open_result<T>(result: &DbResult<T>, mode: &str, started_at: Instant) {
    match result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
}
