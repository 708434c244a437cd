//! INSERT and DROP statement building.

use crate::{Result, StageError, Value};
use super::builder::QueryBuilder;
use super::helpers::{quote_identifier, quote_type_name, validate_identifier};

impl QueryBuilder {
    /// Builds a single-row INSERT with `$1, $2, ...` placeholders.
    ///
    /// NULL values are written as the `NULL` literal and are not part of the
    /// returned parameter list. Columns registered with [`cast`](Self::cast)
    /// get `$n::type`.
    pub fn build_insert(&self, values: &[(String, Value)]) -> Result<(String, Vec<Value>)> {
        if values.is_empty() {
            return Err(StageError::Query("Cannot insert with no values".to_string()));
        }

        for (col, _) in values {
            validate_identifier(col)?;
        }

        let columns: Vec<String> = values.iter().map(|(col, _)| quote_identifier(col)).collect();

        let mut params = Vec::with_capacity(values.len());
        let placeholders: Vec<String> = values
            .iter()
            .map(|(column, value)| {
                if value.is_null() {
                    return "NULL".to_string();
                }
                params.push(value.clone());
                match self.casts.iter().find(|(cast_column, _)| cast_column == column) {
                    Some((_, type_name)) => format!("${}::{}", params.len(), quote_type_name(type_name)),
                    None => format!("${}", params.len()),
                }
            })
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(&self.table),
            columns.join(", "),
            placeholders.join(", ")
        );

        if !self.returning.is_empty() {
            let returning: Vec<String> = self.returning.iter().map(|c| quote_identifier(c)).collect();
            sql.push_str(" RETURNING ");
            sql.push_str(&returning.join(", "));
        }

        Ok((sql, params))
    }
}

/// `DROP TABLE [IF EXISTS] table`.
pub fn build_drop_table(table: &str, if_exists: bool) -> Result<String> {
    validate_identifier(table)?;
    Ok(if if_exists {
        format!("DROP TABLE IF EXISTS {}", quote_identifier(table))
    } else {
        format!("DROP TABLE {}", quote_identifier(table))
    })
}
