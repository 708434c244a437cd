//! QueryBuilder struct and core implementation.

use crate::{Result, Value};
use super::helpers::validate_identifier;

/// SQL builder for the handful of statements the stage layer issues.
///
/// Produces SQL text with `$n` placeholders plus the values to bind, in order.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) table: String,
    /// SELECT columns (empty means SELECT *)
    pub(crate) select_columns: Vec<String>,
    /// Equality filters joined with AND
    pub(crate) where_eq: Vec<(String, Value)>,
    pub(crate) limit_value: Option<i64>,
    /// Columns for the RETURNING clause of an INSERT
    pub(crate) returning: Vec<String>,
    /// `(column, type)` casts applied to INSERT placeholders
    pub(crate) casts: Vec<(String, String)>,
}

impl QueryBuilder {
    /// Creates a new query builder for a table.
    ///
    /// # Errors
    ///
    /// Returns error if the table name is not a valid identifier.
    pub fn new(table: &str) -> Result<Self> {
        validate_identifier(table)?;
        Ok(Self {
            table: table.to_string(),
            select_columns: Vec::new(),
            where_eq: Vec::new(),
            limit_value: None,
            returning: Vec::new(),
            casts: Vec::new(),
        })
    }

    /// Restricts the SELECT list. Column names may be plain expressions only
    /// if they are valid identifiers.
    pub fn select<S: AsRef<str>>(mut self, columns: &[S]) -> Result<Self> {
        for column in columns {
            validate_identifier(column.as_ref())?;
            self.select_columns.push(column.as_ref().to_string());
        }
        Ok(self)
    }

    /// Adds `column = $n`.
    pub fn where_eq(mut self, column: &str, value: Value) -> Result<Self> {
        validate_identifier(column)?;
        self.where_eq.push((column.to_string(), value));
        Ok(self)
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit_value = Some(limit);
        self
    }

    /// Adds a column to the RETURNING clause of [`build_insert`](Self::build_insert).
    pub fn returning(mut self, column: &str) -> Result<Self> {
        validate_identifier(column)?;
        self.returning.push(column.to_string());
        Ok(self)
    }

    /// Renders the INSERT placeholder of `column` as `$n::type`.
    ///
    /// `type_name` is a catalog type name and is quoted, not validated.
    pub fn cast(mut self, column: &str, type_name: &str) -> Result<Self> {
        validate_identifier(column)?;
        self.casts.push((column.to_string(), type_name.to_string()));
        Ok(self)
    }
}
