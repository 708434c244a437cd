//! PostgreSQL row representation.
//!
//! Rows keep the column order of the result set so that callers can address
//! values either by name or by the position reported in the column descriptors.

use serde_json::Value as JsonValue;

use crate::{row_values, Result, StageError, Value};

/// A single row from a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<(String, Value)>,
}

impl Row {
    /// Creates a new row from ordered `(column, value)` pairs.
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }

    /// Gets a value by column name.
    pub fn get(&self, column: &str) -> Result<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| StageError::InvalidColumn(column.to_string()))
    }

    /// Gets a value by position.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx).map(|(_, value)| value)
    }

    /// Column names in result order.
    pub fn columns(&self) -> Vec<&str> {
        self.values.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ordered `(column, value)` pairs.
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    /// Converts row to a JSON object.
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .values
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(map)
    }

    /// Converts from SQLx row.
    pub fn from_sqlx(row: &sqlx::postgres::PgRow) -> Result<Self> {
        Ok(Self {
            values: row_values(row)?,
        })
    }
}
