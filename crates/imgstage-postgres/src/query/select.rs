//! SELECT and SELECT ... INTO statement building.

use crate::{Result, Value};
use super::builder::QueryBuilder;
use super::helpers::{quote_identifier, validate_identifier};

impl QueryBuilder {
    /// Builds a SELECT statement with `$n` placeholders.
    pub fn build_select(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();

        let columns = if self.select_columns.is_empty() {
            "*".to_string()
        } else {
            self.select_columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, quote_identifier(&self.table));

        if !self.where_eq.is_empty() {
            let conditions: Vec<String> = self
                .where_eq
                .iter()
                .map(|(column, value)| {
                    params.push(value.clone());
                    format!("{} = ${}", quote_identifier(column), params.len())
                })
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if let Some(limit) = self.limit_value {
            params.push(Value::BigInt(limit));
            sql.push_str(&format!(" LIMIT ${}", params.len()));
        }

        (sql, params)
    }
}

/// `SELECT * INTO target FROM left JOIN right USING (column)`.
pub fn build_select_into_join(
    target: &str,
    left: &str,
    right: &str,
    using_column: &str,
) -> Result<String> {
    for name in [target, left, right, using_column] {
        validate_identifier(name)?;
    }
    Ok(format!(
        "SELECT * INTO {} FROM {} JOIN {} USING ({})",
        quote_identifier(target),
        quote_identifier(left),
        quote_identifier(right),
        quote_identifier(using_column)
    ))
}
