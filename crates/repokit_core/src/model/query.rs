//! Predicate shapes accepted by filtered operations.
//!
//! # Responsibility
//! - Describe `WHERE` conditions as data: single field, field lists, nested
//!   groups, dynamic objects and primary-key shortcuts.
//! - Collapse every predicate shape into one [`Filter`] parameter.
//!
//! # Invariants
//! - `Key`/`Keys` filters resolve against the table primary key only.
//! - Field lists and objects combine their conditions with `AND`.

use crate::model::field::Field;
use crate::model::record::Record;
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

static NULL: Value = Value::Null;

/// Comparison applied by a [`QueryField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
    NotLike,
    /// Expects exactly two values: lower and upper bound.
    Between,
    NotBetween,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

/// Logical operator joining the members of a [`QueryGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One column condition.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryField {
    pub field: Field,
    pub operation: Operation,
    pub values: Vec<Value>,
}

impl QueryField {
    pub fn new(name: impl Into<String>, operation: Operation, value: impl Into<Value>) -> Self {
        Self {
            field: Field::new(name),
            operation,
            values: vec![value.into()],
        }
    }

    pub fn equal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operation::Equal, value)
    }

    pub fn between(
        name: impl Into<String>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> Self {
        Self {
            field: Field::new(name),
            operation: Operation::Between,
            values: vec![lower.into(), upper.into()],
        }
    }

    pub fn in_list<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            field: Field::new(name),
            operation: Operation::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(name: impl Into<String>) -> Self {
        Self {
            field: Field::new(name),
            operation: Operation::IsNull,
            values: Vec::new(),
        }
    }

    /// First value, or `NULL` when the condition carries none.
    pub fn value(&self) -> &Value {
        self.values.first().unwrap_or(&NULL)
    }
}

/// Nested set of conditions joined by one [`Conjunction`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryGroup {
    pub query_fields: Vec<QueryField>,
    pub groups: Vec<QueryGroup>,
    pub conjunction: Conjunction,
    /// Negates the whole group.
    pub is_not: bool,
}

impl QueryGroup {
    pub fn new(query_fields: Vec<QueryField>, conjunction: Conjunction) -> Self {
        Self {
            query_fields,
            groups: Vec::new(),
            conjunction,
            is_not: false,
        }
    }

    pub fn with_group(mut self, group: QueryGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn negate(mut self) -> Self {
        self.is_not = !self.is_not;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.query_fields.is_empty() && self.groups.iter().all(QueryGroup::is_empty)
    }
}

/// Predicate parameter shared by every filtered operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No `WHERE` clause.
    #[default]
    All,
    /// Primary key equals the value.
    Key(Value),
    /// Primary key is one of the values.
    Keys(Vec<Value>),
    /// Every entry is an equality condition (dynamic object predicate).
    Object(Record),
    Field(QueryField),
    Fields(Vec<QueryField>),
    Group(QueryGroup),
}

impl Filter {
    pub fn key(value: impl Into<Value>) -> Self {
        Self::Key(value.into())
    }

    /// Whether resolving this filter needs the table primary key.
    pub fn needs_primary_key(&self) -> bool {
        matches!(self, Self::Key(_) | Self::Keys(_))
    }

    /// Resolves the filter into a condition group.
    ///
    /// Returns `None` for [`Filter::All`].
    ///
    /// # Errors
    /// - `MissingPrimaryKey` when a key filter is used without a primary key.
    /// - `InvalidFilter` when an object, field list or group filter has no
    ///   conditions. Only [`Filter::All`] addresses every row.
    pub fn to_group(
        &self,
        table: &str,
        primary_key: Option<&str>,
    ) -> RepoResult<Option<QueryGroup>> {
        let group = match self {
            Self::All => return Ok(None),
            Self::Key(value) => {
                let key = require_primary_key(table, primary_key)?;
                QueryGroup::new(vec![QueryField::equal(key, value.clone())], Conjunction::And)
            }
            Self::Keys(values) => {
                let key = require_primary_key(table, primary_key)?;
                QueryGroup::new(
                    vec![QueryField::in_list(key, values.iter().cloned())],
                    Conjunction::And,
                )
            }
            Self::Object(record) => {
                if record.is_empty() {
                    return Err(RepoError::InvalidFilter(format!(
                        "object filter for `{table}` has no fields"
                    )));
                }
                let fields = record
                    .iter()
                    .map(|(name, value)| QueryField::equal(name.as_str(), value.clone()))
                    .collect();
                QueryGroup::new(fields, Conjunction::And)
            }
            Self::Field(field) => QueryGroup::new(vec![field.clone()], Conjunction::And),
            Self::Fields(fields) => QueryGroup::new(fields.clone(), Conjunction::And),
            Self::Group(group) => group.clone(),
        };
        if group.is_empty() {
            return Err(RepoError::InvalidFilter(format!(
                "filter for `{table}` has no conditions"
            )));
        }
        Ok(Some(group))
    }
}

impl From<QueryField> for Filter {
    fn from(value: QueryField) -> Self {
        Self::Field(value)
    }
}

impl From<Vec<QueryField>> for Filter {
    fn from(value: Vec<QueryField>) -> Self {
        Self::Fields(value)
    }
}

impl From<QueryGroup> for Filter {
    fn from(value: QueryGroup) -> Self {
        Self::Group(value)
    }
}

impl From<Record> for Filter {
    fn from(value: Record) -> Self {
        Self::Object(value)
    }
}

fn require_primary_key<'a>(table: &str, primary_key: Option<&'a str>) -> RepoResult<&'a str> {
    primary_key.ok_or_else(|| RepoError::MissingPrimaryKey(table.to_string()))
}
