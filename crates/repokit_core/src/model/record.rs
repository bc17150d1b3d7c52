//! Row payloads for table-name and typed operations.
//!
//! # Responsibility
//! - Define the dynamic row shape ([`Record`]) used by table-name operations.
//! - Define the [`Entity`] contract typed operations map through.
//!
//! # Invariants
//! - Column names are kept sorted, so generated statements are deterministic.
//! - A column missing from a record reads as `NULL`.

use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::{FromSql, Value, ValueRef};
use std::collections::BTreeMap;

/// Dynamic row: column name to SQLite value.
pub type Record = BTreeMap<String, Value>;

/// Default number of rows written per statement by batch operations.
pub const DEFAULT_BATCH_OPERATION_SIZE: usize = 10;

/// Typed row mapping, implemented by hand for each table-backed type.
///
/// ```ignore
/// impl Entity for Person {
///     const TABLE: &'static str = "Person";
///     const PRIMARY_KEY: &'static str = "id";
///
///     fn to_record(&self) -> Record { ... }
///     fn from_record(mut record: Record) -> RepoResult<Self> {
///         Ok(Self { id: take_field(&mut record, "id")?, ... })
///     }
/// }
/// ```
pub trait Entity: Sized {
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str;

    fn to_record(&self) -> Record;
    fn from_record(record: Record) -> RepoResult<Self>;

    /// Primary key value carried by this entity, `NULL` when unset.
    fn key_value(&self) -> Value {
        self.to_record()
            .remove(Self::PRIMARY_KEY)
            .unwrap_or(Value::Null)
    }
}

/// Removes `name` from `record` and converts it to `T`.
///
/// # Errors
/// - `InvalidData` when the stored value cannot convert to `T`.
pub fn take_field<T: FromSql>(record: &mut Record, name: &str) -> RepoResult<T> {
    let value = record.remove(name).unwrap_or(Value::Null);
    T::column_result(ValueRef::from(&value)).map_err(|err| {
        RepoError::InvalidData(format!("column `{name}` cannot be read: {err}"))
    })
}

/// Builds a record from `(column, value)` pairs.
pub fn record_of<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}
