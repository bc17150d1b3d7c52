//! Insert, update, delete, merge and truncate.

use super::execute::{atomically, execute, scalar, Table};
use crate::model::field::Field;
use crate::model::query::{Conjunction, Filter, QueryField, QueryGroup};
use crate::model::record::Record;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::settings::RepositorySettings;
use crate::statement::{QuerySpec, Statement};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};

/// Inserts one row and returns its primary key value.
///
/// The key is the value supplied in `record` when present, otherwise the
/// rowid SQLite assigned.
pub fn insert(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    record: &Record,
    hints: Option<&str>,
) -> RepoResult<Value> {
    let statement = settings
        .statement_builder
        .create_insert(table.name, record, hints)?;
    execute(conn, settings, "insert", statement)?;
    let key = table.primary_key(conn)?;
    Ok(inserted_key(conn, record, key.as_deref()))
}

/// Inserts `records` in statements of at most `batch_size` rows.
///
/// Returns the number of inserted rows. All statements share one
/// transaction unless the caller already opened one.
pub fn insert_all(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    records: &[Record],
    batch_size: Option<usize>,
    hints: Option<&str>,
) -> RepoResult<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let batch_size = settings.resolve_batch_size(batch_size);
    atomically(conn, || {
        let mut inserted = 0;
        for chunk in records.chunks(batch_size) {
            let statement = settings
                .statement_builder
                .create_insert_all(table.name, chunk, hints)?;
            inserted += execute(conn, settings, "insert_all", statement)?;
        }
        debug!(
            "event=insert_all module=ops table={} rows={} batch_size={batch_size}",
            table.name, inserted
        );
        Ok(inserted)
    })
}

/// Updates the rows matched by `filter` with every column of `record`.
pub fn update(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    record: &Record,
    filter: &Filter,
    hints: Option<&str>,
) -> RepoResult<usize> {
    let filter = table.resolve(conn, filter)?;
    let statement =
        settings
            .statement_builder
            .create_update(table.name, record, filter.as_ref(), hints)?;
    execute(conn, settings, "update", statement)
}

/// Updates each record by its qualifier columns (the primary key by default).
///
/// Qualifier columns identify the row and are not written.
pub fn update_all(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    records: &[Record],
    qualifiers: Option<&[Field]>,
    batch_size: Option<usize>,
    hints: Option<&str>,
) -> RepoResult<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let qualifiers = resolve_qualifiers(conn, table, qualifiers)?;
    let batch_size = settings.resolve_batch_size(batch_size);
    atomically(conn, || {
        let mut updated = 0;
        for chunk in records.chunks(batch_size) {
            for record in chunk {
                let statement = qualified_update(settings, table, record, &qualifiers, hints)?;
                updated += execute(conn, settings, "update_all", statement)?;
            }
        }
        Ok(updated)
    })
}

pub fn delete(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    filter: &Filter,
    hints: Option<&str>,
) -> RepoResult<usize> {
    let filter = table.resolve(conn, filter)?;
    let statement = settings
        .statement_builder
        .create_delete(table.name, filter.as_ref(), hints)?;
    execute(conn, settings, "delete", statement)
}

pub fn delete_all(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    hints: Option<&str>,
) -> RepoResult<usize> {
    let statement = settings
        .statement_builder
        .create_delete(table.name, None, hints)?;
    execute(conn, settings, "delete_all", statement)
}

/// Updates the row matched by the qualifier columns, or inserts `record`
/// when none matches. Returns the primary key value of the affected row.
pub fn merge(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    record: &Record,
    qualifiers: Option<&[Field]>,
    hints: Option<&str>,
) -> RepoResult<Value> {
    let qualifiers = resolve_qualifiers(conn, table, qualifiers)?;
    let key = table.primary_key(conn)?;
    atomically(conn, || {
        if merge_update(conn, settings, table, record, &qualifiers, hints, "merge")?.is_some() {
            return existing_key(conn, settings, table, record, &qualifiers, key.as_deref());
        }
        let statement = settings
            .statement_builder
            .create_insert(table.name, record, hints)?;
        execute(conn, settings, "merge", statement)?;
        Ok(inserted_key(conn, record, key.as_deref()))
    })
}

/// Merges every record; rows that match nothing are inserted together, at
/// most `batch_size` per statement.
///
/// Returns the number of rows written: every row a qualifier update
/// touched plus every inserted row. A record whose only columns are its
/// qualifiers writes nothing when it matches.
pub fn merge_all(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    records: &[Record],
    qualifiers: Option<&[Field]>,
    batch_size: Option<usize>,
    hints: Option<&str>,
) -> RepoResult<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let qualifiers = resolve_qualifiers(conn, table, qualifiers)?;
    let batch_size = settings.resolve_batch_size(batch_size);
    atomically(conn, || {
        let mut affected = 0;
        for chunk in records.chunks(batch_size) {
            let mut pending = Vec::new();
            for record in chunk {
                match merge_update(conn, settings, table, record, &qualifiers, hints, "merge_all")? {
                    Some(updated) => affected += updated,
                    None => pending.push(record.clone()),
                }
            }
            if !pending.is_empty() {
                let statement = settings
                    .statement_builder
                    .create_insert_all(table.name, &pending, hints)?;
                affected += execute(conn, settings, "merge_all", statement)?;
            }
        }
        Ok(affected)
    })
}

/// Deletes every row and resets the table's autoincrement counter.
pub fn truncate(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
) -> RepoResult<usize> {
    let statement = settings.statement_builder.create_truncate(table.name)?;
    atomically(conn, || {
        let deleted = execute(conn, settings, "truncate", statement)?;
        if has_sequence_table(conn)? {
            execute(
                conn,
                settings,
                "truncate",
                Statement::new(
                    "DELETE FROM \"sqlite_sequence\" WHERE \"name\" = ?;",
                    vec![Value::Text(table.name.to_string())],
                ),
            )?;
        }
        Ok(deleted)
    })
}

fn resolve_qualifiers(
    conn: &Connection,
    table: Table<'_>,
    qualifiers: Option<&[Field]>,
) -> RepoResult<Vec<Field>> {
    match qualifiers {
        Some(fields) if !fields.is_empty() => Ok(fields.to_vec()),
        _ => table
            .primary_key(conn)?
            .map(|key| vec![Field::new(key)])
            .ok_or_else(|| RepoError::MissingPrimaryKey(table.name.to_string())),
    }
}

fn qualifier_group(record: &Record, qualifiers: &[Field], table: &str) -> RepoResult<QueryGroup> {
    let conditions = qualifiers
        .iter()
        .map(|field| match record.get(&field.name) {
            Some(value) => Ok(QueryField::equal(field.name.as_str(), value.clone())),
            None => Err(RepoError::InvalidFilter(format!(
                "record for `{table}` has no value for qualifier `{}`",
                field.name
            ))),
        })
        .collect::<RepoResult<Vec<_>>>()?;
    Ok(QueryGroup::new(conditions, Conjunction::And))
}

fn without_qualifiers(record: &Record, qualifiers: &[Field]) -> Record {
    record
        .iter()
        .filter(|(name, _)| !qualifiers.iter().any(|field| &field.name == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn qualified_update(
    settings: &RepositorySettings,
    table: Table<'_>,
    record: &Record,
    qualifiers: &[Field],
    hints: Option<&str>,
) -> RepoResult<Statement> {
    let filter = qualifier_group(record, qualifiers, table.name)?;
    let changes = without_qualifiers(record, qualifiers);
    settings
        .statement_builder
        .create_update(table.name, &changes, Some(&filter), hints)
}

/// Rows updated through the qualifiers, `None` when no row matched.
fn merge_update(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    record: &Record,
    qualifiers: &[Field],
    hints: Option<&str>,
    key: &str,
) -> RepoResult<Option<usize>> {
    let changes = without_qualifiers(record, qualifiers);
    if changes.is_empty() {
        let filter = qualifier_group(record, qualifiers, table.name)?;
        let statement =
            settings
                .statement_builder
                .create_exists(table.name, Some(&filter), hints)?;
        let found = scalar(conn, settings, key, statement)? != Value::Null;
        return Ok(found.then_some(0));
    }
    let statement = qualified_update(settings, table, record, qualifiers, hints)?;
    let updated = execute(conn, settings, key, statement)?;
    Ok((updated > 0).then_some(updated))
}

fn existing_key(
    conn: &Connection,
    settings: &RepositorySettings,
    table: Table<'_>,
    record: &Record,
    qualifiers: &[Field],
    key: Option<&str>,
) -> RepoResult<Value> {
    let Some(key) = key else {
        return Ok(Value::Null);
    };
    if let Some(value) = record.get(key).filter(|value| **value != Value::Null) {
        return Ok(value.clone());
    }
    let filter = qualifier_group(record, qualifiers, table.name)?;
    let fields = [Field::new(key)];
    let spec = QuerySpec {
        fields: Some(&fields),
        filter: Some(&filter),
        top: Some(1),
        ..QuerySpec::new(table.name)
    };
    let statement = settings.statement_builder.create_query(&spec)?;
    scalar(conn, settings, "merge", statement)
}

fn inserted_key(conn: &Connection, record: &Record, key: Option<&str>) -> Value {
    key.and_then(|key| record.get(key))
        .filter(|value| **value != Value::Null)
        .cloned()
        .unwrap_or_else(|| Value::Integer(conn.last_insert_rowid()))
}

fn has_sequence_table(conn: &Connection) -> RepoResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence';",
            [],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::{merge, merge_all, truncate, update_all};
    use crate::model::field::Field;
    use crate::model::record::record_of;
    use crate::ops::execute::Table;
    use crate::repo::error::RepoError;
    use crate::repo::settings::RepositorySettings;
    use rusqlite::types::Value;
    use rusqlite::Connection;

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Person (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL
             );
             CREATE TABLE Tag (label TEXT);",
        )
        .unwrap();
        conn
    }

    fn names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn.prepare("SELECT name FROM Person ORDER BY id").unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn merge_inserts_then_updates_by_qualifier() {
        let conn = connection();
        let settings = RepositorySettings::default();
        let qualifiers = [Field::new("email")];
        let table = Table::named("Person");

        let inserted = merge(
            &conn,
            &settings,
            table,
            &record_of([("email", "ada@example.com".to_string()), ("name", "Ada".to_string())]),
            Some(&qualifiers),
            None,
        )
        .unwrap();
        let updated = merge(
            &conn,
            &settings,
            table,
            &record_of([
                ("email", "ada@example.com".to_string()),
                ("name", "Ada Lovelace".to_string()),
            ]),
            Some(&qualifiers),
            None,
        )
        .unwrap();

        assert_eq!(inserted, Value::Integer(1));
        assert_eq!(updated, Value::Integer(1));
        assert_eq!(names(&conn), vec!["Ada Lovelace".to_string()]);
    }

    #[test]
    fn merge_all_counts_updates_and_inserts() {
        let conn = connection();
        let settings = RepositorySettings::default();
        conn.execute(
            "INSERT INTO Person (email, name) VALUES ('a@example.com', 'A')",
            [],
        )
        .unwrap();
        let records = vec![
            record_of([("email", "a@example.com".to_string()), ("name", "A2".to_string())]),
            record_of([("email", "b@example.com".to_string()), ("name", "B".to_string())]),
            record_of([("email", "c@example.com".to_string()), ("name", "C".to_string())]),
        ];
        let qualifiers = [Field::new("email")];

        let affected = merge_all(
            &conn,
            &settings,
            Table::named("Person"),
            &records,
            Some(&qualifiers),
            Some(2),
            None,
        )
        .unwrap();

        assert_eq!(affected, 3);
        assert_eq!(names(&conn), vec!["A2", "B", "C"]);
    }

    #[test]
    fn merge_all_counts_every_row_a_qualifier_touches() {
        let conn = connection();
        let settings = RepositorySettings::default();
        conn.execute_batch(
            "CREATE TABLE Reading (sensor TEXT NOT NULL, value INTEGER);
             INSERT INTO Reading (sensor, value) VALUES ('north', 1), ('north', 2);",
        )
        .unwrap();
        let records = vec![
            record_of([("sensor", Value::Text("north".to_string())), ("value", Value::Integer(9))]),
            record_of([("sensor", Value::Text("south".to_string())), ("value", Value::Integer(4))]),
            record_of([("sensor", Value::Text("south".to_string()))]),
        ];
        let qualifiers = [Field::new("sensor")];

        let affected = merge_all(
            &conn,
            &settings,
            Table::named("Reading"),
            &records,
            Some(&qualifiers),
            Some(1),
            None,
        )
        .unwrap();

        assert_eq!(affected, 3);
        let nines: i64 = conn
            .query_row("SELECT COUNT(*) FROM Reading WHERE value = 9", [], |row| row.get(0))
            .unwrap();
        assert_eq!(nines, 2);
    }

    #[test]
    fn update_all_requires_a_qualifier() {
        let conn = connection();
        let err = update_all(
            &conn,
            &RepositorySettings::default(),
            Table::named("Tag"),
            &[record_of([("label", "x".to_string())])],
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, RepoError::MissingPrimaryKey(_)));
    }

    #[test]
    fn truncate_resets_autoincrement() {
        let conn = connection();
        let settings = RepositorySettings::default();
        conn.execute_batch(
            "INSERT INTO Person (email, name) VALUES ('a@example.com', 'A');
             INSERT INTO Person (email, name) VALUES ('b@example.com', 'B');",
        )
        .unwrap();

        let deleted = truncate(&conn, &settings, Table::named("Person")).unwrap();
        conn.execute(
            "INSERT INTO Person (email, name) VALUES ('c@example.com', 'C')",
            [],
        )
        .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(conn.last_insert_rowid(), 1);
    }
}
