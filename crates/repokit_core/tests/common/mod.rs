#![allow(dead_code)]

use async_trait::async_trait;
use repokit_core::db::DbResult;
use repokit_core::{
    take_field, AsyncConnection, Cache, CancellableTraceLog, ConnectionFactory, DbRepository,
    Entity, Field, QueryGroup, QuerySpec, Record, RepoResult, RepositorySettings,
    SqliteConnectionFactory, SqliteStatementBuilder, Statement, StatementBuilder, Trace,
    TraceLog,
};
use repokit_core::{Aggregate, Value};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SCHEMA: &str = "
    CREATE TABLE Person (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT UNIQUE,
        age INTEGER
    );
    CREATE TABLE Tag (label TEXT NOT NULL);
";

/// Temporary database file with the test schema applied.
pub fn person_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");
    Connection::open(&path).unwrap().execute_batch(SCHEMA).unwrap();
    (dir, path)
}

pub fn repository() -> (TempDir, DbRepository<CountingFactory>) {
    repository_with(RepositorySettings::default())
}

pub fn repository_with(settings: RepositorySettings) -> (TempDir, DbRepository<CountingFactory>) {
    let (dir, path) = person_db();
    let repo = DbRepository::with_settings(CountingFactory::file(&path), settings);
    (dir, repo)
}

pub fn row_count(path: &Path, table: &str) -> i64 {
    Connection::open(path)
        .unwrap()
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })
        .unwrap()
}

/// Connection factory that counts every create and release.
pub struct CountingFactory {
    inner: SqliteConnectionFactory,
    created: AtomicUsize,
    released: AtomicUsize,
    async_created: AtomicUsize,
    async_released: AtomicUsize,
}

impl CountingFactory {
    pub fn file(path: &Path) -> Self {
        Self {
            inner: SqliteConnectionFactory::file(path),
            created: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            async_created: AtomicUsize::new(0),
            async_released: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> PathBuf {
        match self.inner.target() {
            repokit_core::DatabaseTarget::File(path) => path.clone(),
            other => panic!("unexpected target {other:?}"),
        }
    }

    /// `(created, released)` for blocking connections.
    pub fn sync_counts(&self) -> (usize, usize) {
        (
            self.created.load(Ordering::SeqCst),
            self.released.load(Ordering::SeqCst),
        )
    }

    /// `(created, released)` for async connections.
    pub fn async_counts(&self) -> (usize, usize) {
        (
            self.async_created.load(Ordering::SeqCst),
            self.async_released.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ConnectionFactory for CountingFactory {
    fn create_connection(&self) -> DbResult<Connection> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_connection()
    }

    fn release_connection(&self, conn: Connection) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release_connection(conn);
    }

    async fn create_async_connection(&self) -> DbResult<AsyncConnection> {
        self.async_created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_async_connection().await
    }

    async fn release_async_connection(&self, conn: AsyncConnection) {
        self.async_released.fetch_add(1, Ordering::SeqCst);
        self.inner.release_async_connection(conn).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub age: Option<i64>,
}

impl Person {
    pub fn new(name: &str, email: &str, age: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            email: Some(email.to_string()),
            age: Some(age),
        }
    }
}

impl Entity for Person {
    const TABLE: &'static str = "Person";
    const PRIMARY_KEY: &'static str = "id";

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), self.id.map_or(Value::Null, Value::Integer));
        record.insert("name".to_string(), Value::Text(self.name.clone()));
        record.insert(
            "email".to_string(),
            self.email.clone().map_or(Value::Null, Value::Text),
        );
        record.insert("age".to_string(), self.age.map_or(Value::Null, Value::Integer));
        record
    }

    fn from_record(mut record: Record) -> RepoResult<Self> {
        Ok(Self {
            id: take_field(&mut record, "id")?,
            name: take_field(&mut record, "name")?,
            email: take_field(&mut record, "email")?,
            age: take_field(&mut record, "age")?,
        })
    }
}

/// Row of the keyless `Tag` table, addressed by its label.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub label: String,
}

impl Label {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

impl Entity for Label {
    const TABLE: &'static str = "Tag";
    const PRIMARY_KEY: &'static str = "label";

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("label".to_string(), Value::Text(self.label.clone()));
        record
    }

    fn from_record(mut record: Record) -> RepoResult<Self> {
        Ok(Self {
            label: take_field(&mut record, "label")?,
        })
    }
}

/// One statement builder invocation, with the arguments it received.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderCall {
    pub method: &'static str,
    pub table: String,
    pub records: Vec<Record>,
    pub filter: Option<QueryGroup>,
    pub hints: Option<String>,
}

/// Statement builder that records its arguments and delegates to the
/// default SQLite builder.
#[derive(Default)]
pub struct RecordingBuilder {
    inner: SqliteStatementBuilder,
    calls: Mutex<Vec<BuilderCall>>,
}

impl RecordingBuilder {
    pub fn calls(&self) -> Vec<BuilderCall> {
        self.calls.lock().unwrap().clone()
    }

    fn push(
        &self,
        method: &'static str,
        table: &str,
        records: &[Record],
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) {
        self.calls.lock().unwrap().push(BuilderCall {
            method,
            table: table.to_string(),
            records: records.to_vec(),
            filter: filter.cloned(),
            hints: hints.map(str::to_string),
        });
    }
}

impl StatementBuilder for RecordingBuilder {
    fn create_insert(
        &self,
        table: &str,
        record: &Record,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        self.push("insert", table, std::slice::from_ref(record), None, hints);
        self.inner.create_insert(table, record, hints)
    }

    fn create_insert_all(
        &self,
        table: &str,
        records: &[Record],
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        self.push("insert_all", table, records, None, hints);
        self.inner.create_insert_all(table, records, hints)
    }

    fn create_update(
        &self,
        table: &str,
        record: &Record,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        self.push("update", table, std::slice::from_ref(record), filter, hints);
        self.inner.create_update(table, record, filter, hints)
    }

    fn create_delete(
        &self,
        table: &str,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        self.push("delete", table, &[], filter, hints);
        self.inner.create_delete(table, filter, hints)
    }

    fn create_query(&self, spec: &QuerySpec<'_>) -> RepoResult<Statement> {
        self.push("query", spec.table, &[], spec.filter, spec.hints);
        self.inner.create_query(spec)
    }

    fn create_batch_query(
        &self,
        spec: &QuerySpec<'_>,
        page: u32,
        rows_per_batch: u32,
    ) -> RepoResult<Statement> {
        self.push("batch_query", spec.table, &[], spec.filter, spec.hints);
        self.inner.create_batch_query(spec, page, rows_per_batch)
    }

    fn create_aggregate(
        &self,
        table: &str,
        aggregate: Aggregate,
        field: Option<&Field>,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        self.push("aggregate", table, &[], filter, hints);
        self.inner
            .create_aggregate(table, aggregate, field, filter, hints)
    }

    fn create_exists(
        &self,
        table: &str,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        self.push("exists", table, &[], filter, hints);
        self.inner.create_exists(table, filter, hints)
    }

    fn create_truncate(&self, table: &str) -> RepoResult<Statement> {
        self.push("truncate", table, &[], None, None);
        self.inner.create_truncate(table)
    }
}

/// Trace hook that keeps every log and cancels statements of one key.
#[derive(Default)]
pub struct RecordingTrace {
    cancel_key: Option<String>,
    before: Mutex<Vec<TraceLog>>,
    after: Mutex<Vec<TraceLog>>,
}

impl RecordingTrace {
    pub fn cancelling(key: &str) -> Self {
        Self {
            cancel_key: Some(key.to_string()),
            ..Self::default()
        }
    }

    pub fn before(&self) -> Vec<TraceLog> {
        self.before.lock().unwrap().clone()
    }

    pub fn after(&self) -> Vec<TraceLog> {
        self.after.lock().unwrap().clone()
    }
}

impl Trace for RecordingTrace {
    fn before_execution(&self, log: &mut CancellableTraceLog) {
        self.before.lock().unwrap().push(log.log.clone());
        if self.cancel_key.as_deref() == Some(log.log.key.as_str()) {
            log.cancel();
        }
    }

    fn after_execution(&self, log: &TraceLog) {
        self.after.lock().unwrap().push(log.clone());
    }
}

/// In-memory cache that never expires entries on its own.
#[derive(Default)]
pub struct TestCache {
    entries: Mutex<HashMap<String, (Arc<Vec<Record>>, Duration)>>,
    hits: AtomicUsize,
}

impl TestCache {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn expiration(&self, key: &str) -> Option<Duration> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, expiration)| *expiration)
    }
}

impl Cache for TestCache {
    fn get(&self, key: &str) -> Option<Arc<Vec<Record>>> {
        let rows = self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(rows, _)| Arc::clone(rows));
        if rows.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        rows
    }

    fn add(&self, key: &str, rows: Arc<Vec<Record>>, expiration: Duration) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (rows, expiration));
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}
