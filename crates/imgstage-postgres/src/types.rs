//! Value model shared by the writer, the schema validator and the exporter.
//!
//! Values travel to PostgreSQL as bound statement parameters and come back
//! through [`row_values`]. Their [`Display`](std::fmt::Display) form is the
//! text written into label files.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgRow, PgValueFormat};
use sqlx::{Arguments, Column, Row as SqlxRow, TypeInfo, ValueRef};
use std::fmt;

use crate::{Result, StageError};

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean (BOOLEAN)
    Bool(bool),
    /// Small integer (SMALLINT)
    SmallInt(i16),
    /// Integer (INTEGER)
    Int(i32),
    /// Big integer (BIGINT)
    BigInt(i64),
    /// Single-precision float (REAL)
    Float(f32),
    /// Double-precision float (DOUBLE PRECISION)
    Double(f64),
    /// Decimal/Numeric (NUMERIC, DECIMAL)
    Decimal(Decimal),
    /// Variable-length string (VARCHAR, TEXT)
    String(String),
    /// Binary data (BYTEA)
    Bytes(Vec<u8>),
    /// Date (DATE)
    Date(NaiveDate),
    /// Timestamp without timezone (TIMESTAMP)
    Timestamp(NaiveDateTime),
    /// Timestamp with timezone (TIMESTAMPTZ)
    TimestampTz(DateTime<Utc>),
    /// JSON/JSONB (JSON, JSONB)
    Json(JsonValue),
}

impl Value {
    /// Returns the PostgreSQL type name for this value.
    pub fn pg_type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE PRECISION",
            Value::Decimal(_) => "NUMERIC",
            Value::String(_) => "TEXT",
            Value::Bytes(_) => "BYTEA",
            Value::Date(_) => "DATE",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::TimestampTz(_) => "TIMESTAMPTZ",
            Value::Json(_) => "JSONB",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Integer view of any integral value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Bind this value to a sqlx argument list.
    ///
    /// NULL is never bound: the insert builder renders it as a literal so the
    /// server infers the column type instead of receiving a typed null.
    pub fn bind_to_arguments(&self, arguments: &mut PgArguments) -> Result<()> {
        let bound = match self {
            Value::Null => {
                return Err(StageError::Internal(
                    "NULL must be rendered as a literal, not bound".to_string(),
                ))
            }
            Value::Bool(v) => arguments.add(*v),
            Value::SmallInt(v) => arguments.add(*v),
            Value::Int(v) => arguments.add(*v),
            Value::BigInt(v) => arguments.add(*v),
            Value::Float(v) => arguments.add(*v),
            Value::Double(v) => arguments.add(*v),
            Value::Decimal(v) => arguments.add(*v),
            Value::String(v) => arguments.add(v.clone()),
            Value::Bytes(v) => arguments.add(v.clone()),
            Value::Date(v) => arguments.add(*v),
            Value::Timestamp(v) => arguments.add(*v),
            Value::TimestampTz(v) => arguments.add(*v),
            Value::Json(v) => arguments.add(v.clone()),
        };
        bound.map_err(|e| {
            StageError::Query(format!("Failed to bind {}: {}", self.pg_type_name(), e))
        })
    }

    /// Converts the value to JSON for printing. Bytes are summarized by length.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(v) => JsonValue::Bool(*v),
            Value::SmallInt(v) => JsonValue::from(*v),
            Value::Int(v) => JsonValue::from(*v),
            Value::BigInt(v) => JsonValue::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v as f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Double(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Bytes(v) => JsonValue::String(format!("<{} bytes>", v.len())),
            Value::Json(v) => v.clone(),
            other => JsonValue::String(other.to_string()),
        }
    }
}

/// Text form used in label files: floats always carry a decimal point,
/// strings are written verbatim.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
            Value::TimestampTz(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Convert a PgRow into ordered `(column, value)` pairs.
///
/// Column order follows the result's column descriptors.
pub fn row_values(row: &PgRow) -> Result<Vec<(String, Value)>> {
    let mut values = Vec::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        let column_name = column.name().to_string();
        let type_name = column.type_info().name();

        let value = match type_name {
            "BOOL" | "BOOLEAN" => extract(row, idx, &column_name, Value::Bool)?,
            "INT2" | "SMALLINT" => extract(row, idx, &column_name, Value::SmallInt)?,
            "INT4" | "INTEGER" | "INT" => extract(row, idx, &column_name, Value::Int)?,
            "INT8" | "BIGINT" => extract(row, idx, &column_name, Value::BigInt)?,
            "FLOAT4" | "REAL" => extract(row, idx, &column_name, Value::Float)?,
            "FLOAT8" | "DOUBLE PRECISION" => extract(row, idx, &column_name, Value::Double)?,
            "NUMERIC" | "DECIMAL" => extract(row, idx, &column_name, Value::Decimal)?,
            "VARCHAR" | "TEXT" | "CHAR" | "BPCHAR" | "NAME" => {
                extract(row, idx, &column_name, Value::String)?
            }
            "BYTEA" => extract(row, idx, &column_name, Value::Bytes)?,
            "DATE" => extract(row, idx, &column_name, Value::Date)?,
            "TIMESTAMP" => extract(row, idx, &column_name, Value::Timestamp)?,
            "TIMESTAMPTZ" => extract(row, idx, &column_name, Value::TimestampTz)?,
            "JSON" | "JSONB" => extract(row, idx, &column_name, Value::Json)?,
            "UUID" => extract(row, idx, &column_name, |v: uuid::Uuid| {
                Value::String(v.to_string())
            })?,
            unknown => {
                tracing::debug!(
                    "PostgreSQL type '{}' of column '{}' has no mapping, reading its raw value",
                    unknown,
                    column_name
                );
                extract_raw(row, idx, &column_name)?
            }
        };

        values.push((column_name, value));
    }

    Ok(values)
}

fn extract<T>(
    row: &PgRow,
    idx: usize,
    column_name: &str,
    convert: impl Fn(T) -> Value,
) -> Result<Value>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => Ok(convert(v)),
        Ok(None) => Ok(Value::Null),
        Err(e) => Err(StageError::Query(format!(
            "Failed to extract column '{}': {}",
            column_name, e
        ))),
    }
}

/// Raw fallback for types outside the value model: text-format values
/// (simple-protocol results) become strings, binary-format ones bytes.
fn extract_raw(row: &PgRow, idx: usize, column_name: &str) -> Result<Value> {
    let decode_error = |e: &dyn std::fmt::Display| {
        StageError::Query(format!("Failed to extract column '{}': {}", column_name, e))
    };

    let raw = row.try_get_raw(idx).map_err(|e| decode_error(&e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    match raw.format() {
        PgValueFormat::Text => Ok(Value::String(
            raw.as_str().map_err(|e| decode_error(&e))?.to_string(),
        )),
        PgValueFormat::Binary => Ok(Value::Bytes(
            raw.as_bytes().map_err(|e| decode_error(&e))?.to_vec(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_value_type_names() {
        assert_eq!(Value::Null.pg_type_name(), "NULL");
        assert_eq!(Value::Int(1).pg_type_name(), "INTEGER");
        assert_eq!(Value::Double(0.5).pg_type_name(), "DOUBLE PRECISION");
        assert_eq!(Value::Bytes(vec![1]).pg_type_name(), "BYTEA");
        assert_eq!(
            Value::Decimal(Decimal::from_str("1.5").unwrap()).pg_type_name(),
            "NUMERIC"
        );
    }

    #[test]
    fn test_display_label_text() {
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::BigInt(-7).to_string(), "-7");
        assert_eq!(Value::Double(0.5).to_string(), "0.5");
        assert_eq!(Value::Double(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::String("car".into()).to_string(), "car");
        assert_eq!(Value::String("it's".into()).to_string(), "it's");
        assert_eq!(Value::Null.to_string(), "NULL");
        // exponent form below 1e-4, without zero padding
        assert_eq!(Value::Double(0.00005).to_string(), "5e-5");
        assert_eq!(Value::Double(0.0001).to_string(), "0.0001");
        assert_eq!(
            Value::Decimal(Decimal::from_str("0.125").unwrap()).to_string(),
            "0.125"
        );
    }

    #[test]
    fn test_bind_to_arguments() {
        let mut args = PgArguments::default();
        assert!(Value::Int(42).bind_to_arguments(&mut args).is_ok());
        assert!(Value::String("o'brien".into()).bind_to_arguments(&mut args).is_ok());
        assert!(Value::Bytes(vec![0xff, 0xd8]).bind_to_arguments(&mut args).is_ok());
        assert!(Value::Bool(true).bind_to_arguments(&mut args).is_ok());
    }

    #[test]
    fn test_null_is_not_bound() {
        let mut args = PgArguments::default();
        let err = Value::Null.bind_to_arguments(&mut args).unwrap_err();
        assert!(matches!(err, StageError::Internal(_)));
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(7), Value::Int(7));
        assert_eq!(Value::from(7i64), Value::BigInt(7));
        assert_eq!(Value::from("a"), Value::String("a".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(0.5)), Value::Double(0.5));
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::SmallInt(2).as_i64(), Some(2));
        assert_eq!(Value::Int(2).as_i64(), Some(2));
        assert_eq!(Value::BigInt(2).as_i64(), Some(2));
        assert_eq!(Value::Double(2.0).as_i64(), None);
    }

    #[test]
    fn test_to_json() {
        use serde_json::json;
        assert_eq!(Value::Null.to_json(), json!(null));
        assert_eq!(Value::Int(4).to_json(), json!(4));
        assert_eq!(Value::String("x".into()).to_json(), json!("x"));
        assert_eq!(Value::Bytes(vec![0; 3]).to_json(), json!("<3 bytes>"));
    }
}
