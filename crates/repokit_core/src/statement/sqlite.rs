//! SQLite dialect of [`StatementBuilder`].

use super::{Aggregate, QuerySpec, Statement, StatementBuilder};
use crate::model::field::Field;
use crate::model::query::{Operation, QueryField, QueryGroup};
use crate::model::record::Record;
use crate::repo::error::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::collections::BTreeSet;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

// Table hints accepted after the table name of SELECT/UPDATE/DELETE.
static TABLE_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(INDEXED\s+BY\s+[A-Za-z_][A-Za-z0-9_]*|NOT\s+INDEXED)\s*$")
        .expect("table hint pattern is valid")
});

// Conflict clause accepted between INSERT and INTO.
static INSERT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*OR\s+(ROLLBACK|ABORT|REPLACE|FAIL|IGNORE)\s*$")
        .expect("insert hint pattern is valid")
});

/// Validates and double-quotes a table or column name.
///
/// # Errors
/// - `InvalidIdentifier` unless `name` is a plain `[A-Za-z_][A-Za-z0-9_]*` word.
pub fn quote_identifier(name: &str) -> RepoResult<String> {
    if !IDENTIFIER.is_match(name) {
        return Err(RepoError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Default statement builder for SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteStatementBuilder;

impl SqliteStatementBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl StatementBuilder for SqliteStatementBuilder {
    fn create_insert(
        &self,
        table: &str,
        record: &Record,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        self.create_insert_all(table, std::slice::from_ref(record), hints)
    }

    fn create_insert_all(
        &self,
        table: &str,
        records: &[Record],
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        let columns: BTreeSet<&str> = records
            .iter()
            .flat_map(|record| record.keys().map(String::as_str))
            .collect();
        if columns.is_empty() {
            return Err(RepoError::MissingFields(table.to_string()));
        }

        let quoted = columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<RepoResult<Vec<_>>>()?;
        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));

        let mut params = Vec::with_capacity(columns.len() * records.len());
        for record in records {
            for column in &columns {
                params.push(record.get(*column).cloned().unwrap_or(Value::Null));
            }
        }

        let sql = format!(
            "INSERT{} INTO {} ({}) VALUES {};",
            insert_hint(hints)?,
            quote_identifier(table)?,
            quoted.join(", "),
            vec![row_placeholders; records.len()].join(", ")
        );
        Ok(Statement::new(sql, params))
    }

    fn create_update(
        &self,
        table: &str,
        record: &Record,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        if record.is_empty() {
            return Err(RepoError::MissingFields(table.to_string()));
        }

        let mut params = Vec::with_capacity(record.len());
        let mut assignments = Vec::with_capacity(record.len());
        for (column, value) in record {
            assignments.push(format!("{} = ?", quote_identifier(column)?));
            params.push(value.clone());
        }

        let sql = format!(
            "UPDATE {}{} SET {}{};",
            quote_identifier(table)?,
            table_hint(hints)?,
            assignments.join(", "),
            where_clause(filter, &mut params)?
        );
        Ok(Statement::new(sql, params))
    }

    fn create_delete(
        &self,
        table: &str,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM {}{}{};",
            quote_identifier(table)?,
            table_hint(hints)?,
            where_clause(filter, &mut params)?
        );
        Ok(Statement::new(sql, params))
    }

    fn create_query(&self, spec: &QuerySpec<'_>) -> RepoResult<Statement> {
        let mut statement = select(spec)?;
        if let Some(top) = spec.top {
            statement.sql.push_str(" LIMIT ?");
            statement.params.push(Value::Integer(i64::from(top)));
        }
        statement.sql.push(';');
        Ok(statement)
    }

    fn create_batch_query(
        &self,
        spec: &QuerySpec<'_>,
        page: u32,
        rows_per_batch: u32,
    ) -> RepoResult<Statement> {
        if spec.order_by.is_empty() {
            return Err(RepoError::InvalidFilter(format!(
                "batch query on `{}` needs at least one order field",
                spec.table
            )));
        }

        let mut statement = select(spec)?;
        statement.sql.push_str(" LIMIT ? OFFSET ?;");
        statement
            .params
            .push(Value::Integer(i64::from(rows_per_batch)));
        statement
            .params
            .push(Value::Integer(i64::from(page) * i64::from(rows_per_batch)));
        Ok(statement)
    }

    fn create_aggregate(
        &self,
        table: &str,
        aggregate: Aggregate,
        field: Option<&Field>,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        let target = match (aggregate, field) {
            (_, Some(field)) => quote_identifier(&field.name)?,
            (Aggregate::Count, None) => "*".to_string(),
            (_, None) => return Err(RepoError::MissingFields(table.to_string())),
        };

        let mut params = Vec::new();
        let sql = format!(
            "SELECT {}({}) AS \"result\" FROM {}{}{};",
            aggregate.function(),
            target,
            quote_identifier(table)?,
            table_hint(hints)?,
            where_clause(filter, &mut params)?
        );
        Ok(Statement::new(sql, params))
    }

    fn create_exists(
        &self,
        table: &str,
        filter: Option<&QueryGroup>,
        hints: Option<&str>,
    ) -> RepoResult<Statement> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT 1 FROM {}{}{} LIMIT 1;",
            quote_identifier(table)?,
            table_hint(hints)?,
            where_clause(filter, &mut params)?
        );
        Ok(Statement::new(sql, params))
    }

    fn create_truncate(&self, table: &str) -> RepoResult<Statement> {
        Ok(Statement::new(
            format!("DELETE FROM {};", quote_identifier(table)?),
            Vec::new(),
        ))
    }
}

fn select(spec: &QuerySpec<'_>) -> RepoResult<Statement> {
    let projection = match spec.fields {
        Some(fields) if !fields.is_empty() => fields
            .iter()
            .map(|field| quote_identifier(&field.name))
            .collect::<RepoResult<Vec<_>>>()?
            .join(", "),
        _ => "*".to_string(),
    };

    let mut params = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {}{}{}",
        projection,
        quote_identifier(spec.table)?,
        table_hint(spec.hints)?,
        where_clause(spec.filter, &mut params)?
    );

    if !spec.order_by.is_empty() {
        let ordering = spec
            .order_by
            .iter()
            .map(|order| -> RepoResult<String> {
                Ok(format!("{} {}", quote_identifier(&order.name)?, order.order.as_sql()))
            })
            .collect::<RepoResult<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&ordering.join(", "));
    }

    Ok(Statement::new(sql, params))
}

fn table_hint(hints: Option<&str>) -> RepoResult<String> {
    match hints {
        None => Ok(String::new()),
        Some(hints) if TABLE_HINT.is_match(hints) => Ok(format!(" {}", normalize_hint(hints))),
        Some(hints) => Err(RepoError::InvalidHints(hints.to_string())),
    }
}

fn insert_hint(hints: Option<&str>) -> RepoResult<String> {
    match hints {
        None => Ok(String::new()),
        Some(hints) if INSERT_HINT.is_match(hints) => Ok(format!(" {}", normalize_hint(hints))),
        Some(hints) => Err(RepoError::InvalidHints(hints.to_string())),
    }
}

fn normalize_hint(hints: &str) -> String {
    hints.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn where_clause(filter: Option<&QueryGroup>, params: &mut Vec<Value>) -> RepoResult<String> {
    match filter {
        Some(group) => Ok(render_group(group, params)?
            .map(|condition| format!(" WHERE {condition}"))
            .unwrap_or_default()),
        None => Ok(String::new()),
    }
}

fn render_group(group: &QueryGroup, params: &mut Vec<Value>) -> RepoResult<Option<String>> {
    let mut parts = Vec::with_capacity(group.query_fields.len() + group.groups.len());
    for field in &group.query_fields {
        parts.push(render_field(field, params)?);
    }
    for nested in &group.groups {
        if let Some(rendered) = render_group(nested, params)? {
            parts.push(rendered);
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }

    let joined = format!(
        "({})",
        parts.join(&format!(" {} ", group.conjunction.as_sql()))
    );
    if group.is_not {
        return Ok(Some(format!("NOT {joined}")));
    }
    Ok(Some(joined))
}

fn render_field(field: &QueryField, params: &mut Vec<Value>) -> RepoResult<String> {
    let column = quote_identifier(&field.field.name)?;
    let binary = |op: &str, params: &mut Vec<Value>| {
        params.push(field.value().clone());
        format!("{column} {op} ?")
    };

    let rendered = match field.operation {
        Operation::Equal if *field.value() == Value::Null => format!("{column} IS NULL"),
        Operation::NotEqual if *field.value() == Value::Null => format!("{column} IS NOT NULL"),
        Operation::Equal => binary("=", params),
        Operation::NotEqual => binary("<>", params),
        Operation::LessThan => binary("<", params),
        Operation::LessThanOrEqual => binary("<=", params),
        Operation::GreaterThan => binary(">", params),
        Operation::GreaterThanOrEqual => binary(">=", params),
        Operation::Like => binary("LIKE", params),
        Operation::NotLike => binary("NOT LIKE", params),
        Operation::Between | Operation::NotBetween => {
            let [lower, upper] = field.values.as_slice() else {
                return Err(RepoError::InvalidFilter(format!(
                    "`{}` between needs exactly two values, got {}",
                    field.field.name,
                    field.values.len()
                )));
            };
            params.push(lower.clone());
            params.push(upper.clone());
            let keyword = if field.operation == Operation::Between {
                "BETWEEN"
            } else {
                "NOT BETWEEN"
            };
            format!("{column} {keyword} ? AND ?")
        }
        Operation::In | Operation::NotIn if field.values.is_empty() => {
            if field.operation == Operation::In {
                "1 = 0".to_string()
            } else {
                "1 = 1".to_string()
            }
        }
        Operation::In | Operation::NotIn => {
            params.extend(field.values.iter().cloned());
            let keyword = if field.operation == Operation::In {
                "IN"
            } else {
                "NOT IN"
            };
            format!(
                "{column} {keyword} ({})",
                vec!["?"; field.values.len()].join(", ")
            )
        }
        Operation::IsNull => format!("{column} IS NULL"),
        Operation::IsNotNull => format!("{column} IS NOT NULL"),
    };
    Ok(rendered)
}
