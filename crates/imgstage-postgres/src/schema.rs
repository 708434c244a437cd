//! Schema introspection and write validation.
//!
//! Table layouts are read from `information_schema` at call time; nothing is
//! declared statically. [`TableSchema::check`] is the pure half of the
//! validator and normalizes the caller's values in place.

use serde::Serialize;
use sqlx::Row as SqlxRow;
use tracing::{debug, instrument};

use crate::{QueryBuilder, Result, Row, Session, StageError, Value};

const TABLES_SQL: &str = "SELECT table_name::text \
     FROM information_schema.tables \
     WHERE table_schema = 'public' \
     ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT column_name::text, data_type::text, character_maximum_length::int4, udt_name::text \
     FROM information_schema.columns \
     WHERE table_schema = 'public' AND table_name = $1 \
     ORDER BY ordinal_position";

/// Column type families the validator distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    /// `character varying(n)` / `character(n)`
    BoundedText,
    Text,
    Integer,
    Float,
    Boolean,
    Binary,
    Other,
}

impl TypeFamily {
    /// Maps an `information_schema.columns.data_type` string to its family.
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type {
            "character varying" | "character" => TypeFamily::BoundedText,
            "text" => TypeFamily::Text,
            "smallint" | "integer" | "bigint" => TypeFamily::Integer,
            "real" | "double precision" | "numeric" => TypeFamily::Float,
            "boolean" => TypeFamily::Boolean,
            "bytea" => TypeFamily::Binary,
            _ => TypeFamily::Other,
        }
    }
}

/// One column of a live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    /// `character_maximum_length`, only set for bounded character columns
    pub max_length: Option<i32>,
    /// Catalog type name (`uuid`, `timestamptz`, `_int4`, enum names)
    pub udt_name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, max_length: Option<i32>) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            udt_name: data_type.clone(),
            data_type,
            max_length,
        }
    }

    pub fn with_udt_name(mut self, udt_name: impl Into<String>) -> Self {
        self.udt_name = udt_name.into();
        self
    }

    pub fn family(&self) -> TypeFamily {
        TypeFamily::from_data_type(&self.data_type)
    }
}

/// Ordered column list of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `(column, type)` pairs for string values headed for columns the value
    /// model has no binding for (dates, uuids, json, arrays, enums). Those are
    /// sent as text and cast by the server.
    pub fn text_casts<'a>(&'a self, values: &'a [(String, Value)]) -> Vec<(&'a str, &'a str)> {
        values
            .iter()
            .filter(|(_, value)| matches!(value, Value::String(_)))
            .filter_map(|(name, _)| self.column(name))
            .filter(|column| column.family() == TypeFamily::Other)
            .map(|column| (column.name.as_str(), column.udt_name.as_str()))
            .collect()
    }

    /// Checks that every key is a column of this table and normalizes each
    /// value to its column's type family.
    ///
    /// The caller's values are rewritten in place: scalars headed for
    /// character columns become strings, numeric strings headed for numeric
    /// columns are parsed.
    ///
    /// # Errors
    ///
    /// `StageError::Schema` for an unknown column, a string longer than a
    /// bounded column allows, or a string that cannot be parsed for a
    /// numeric/boolean column.
    pub fn check(&self, values: &mut [(String, Value)]) -> Result<()> {
        for (name, value) in values.iter_mut() {
            let column = self.column(name).ok_or_else(|| {
                StageError::Schema(format!(
                    "Invalid column name '{}' for table '{}'",
                    name, self.table
                ))
            })?;
            normalize(&self.table, column, value)?;
        }
        Ok(())
    }
}

fn normalize(table: &str, column: &ColumnInfo, value: &mut Value) -> Result<()> {
    let mismatch = |raw: &str| {
        StageError::Schema(format!(
            "Value '{}' does not fit column '{}.{}' of type {}",
            raw, table, column.name, column.data_type
        ))
    };

    match column.family() {
        TypeFamily::BoundedText | TypeFamily::Text => {
            match &mut *value {
                Value::Null | Value::String(_) | Value::Bytes(_) | Value::Json(_) => {}
                other => *other = Value::String(other.to_string()),
            }
            if let (Some(max), Value::String(s)) = (column.max_length, &*value) {
                if s.chars().count() > max as usize {
                    return Err(StageError::Schema(format!(
                        "Value for column '{}.{}' exceeds maximum length {}",
                        table, column.name, max
                    )));
                }
            }
        }
        TypeFamily::Integer => {
            if let Value::String(s) = value {
                *value = Value::BigInt(s.trim().parse().map_err(|_| mismatch(s))?);
            }
        }
        TypeFamily::Float => {
            if let Value::String(s) = value {
                *value = Value::Double(s.trim().parse().map_err(|_| mismatch(s))?);
            }
        }
        TypeFamily::Boolean => {
            if let Value::String(s) = value {
                *value = match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" | "1" => Value::Bool(true),
                    "false" | "f" | "no" | "0" => Value::Bool(false),
                    _ => return Err(mismatch(s)),
                };
            }
        }
        TypeFamily::Binary | TypeFamily::Other => {}
    }
    Ok(())
}

impl Session {
    /// Tables of the `public` schema.
    pub async fn tables(&mut self) -> Result<Vec<String>> {
        let rows = self.fetch_with(TABLES_SQL, &[]).await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>(0)?))
            .collect()
    }

    /// Column layout of a table, in ordinal order.
    ///
    /// # Errors
    ///
    /// `StageError::Schema` if the table does not exist.
    #[instrument(skip(self))]
    pub async fn get_schema(&mut self, table: &str) -> Result<TableSchema> {
        if !self.tables().await?.iter().any(|t| t == table) {
            return Err(StageError::Schema(format!(
                "Table '{}' is not in the database",
                table
            )));
        }

        let rows = self
            .fetch_with(COLUMNS_SQL, &[Value::String(table.to_string())])
            .await?;
        let columns = rows
            .iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    max_length: row.try_get(2)?,
                    udt_name: row.try_get(3)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(columns = columns.len(), "Schema loaded");
        Ok(TableSchema::new(table, columns))
    }

    /// First `limit` rows of a table.
    pub async fn preview_table(&mut self, table: &str, limit: i64) -> Result<Vec<Row>> {
        self.get_schema(table).await?;
        let (sql, params) = QueryBuilder::new(table)?.limit(limit).build_select();
        let rows = self.fetch_with(&sql, &params).await?;
        rows.iter().map(Row::from_sqlx).collect()
    }

    /// Validates `values` against the live schema of `table`, normalizing them in place.
    pub async fn check(&mut self, table: &str, values: &mut [(String, Value)]) -> Result<()> {
        self.get_schema(table).await?.check(values)
    }
}
