//! Column references used for projections, qualifiers and ordering.

use serde::{Deserialize, Serialize};

/// A single column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Builds a field list from column names, preserving order.
    pub fn from_names<I, S>(names: I) -> Vec<Field>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(Field::new).collect()
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Column plus sort direction for `ORDER BY`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderField {
    pub name: String,
    pub order: Order,
}

impl OrderField {
    pub fn ascending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: Order::Ascending,
        }
    }

    pub fn descending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: Order::Descending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, Order, OrderField};

    #[test]
    fn from_names_keeps_declaration_order() {
        let fields = Field::from_names(["id", "name", "age"]);
        let names: Vec<_> = fields.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "age"]);
    }

    #[test]
    fn order_field_serializes_with_snake_case_direction() {
        let json = serde_json::to_string(&OrderField::descending("created_at")).unwrap();
        assert_eq!(json, r#"{"name":"created_at","order":"descending"}"#);

        let parsed: OrderField = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.order, Order::Descending);
    }
}
