//! Error types for imgstage

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imgstage operations
pub type Result<T> = std::result::Result<T, StageError>;

/// Unified error type for all imgstage operations
#[derive(Error, Debug, Clone)]
pub enum StageError {
    /// Unknown table, unknown column, or a value the column cannot hold
    #[error("Schema error: {0}")]
    Schema(String),

    /// Local image path absent at insert or upload time
    #[error("Missing file: {}", .0.display())]
    MissingFile(PathBuf),

    /// Requested export column absent from the fetched result
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Unique constraint violation (SQLSTATE 23505)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Foreign key constraint violation (SQLSTATE 23503)
    #[error("Foreign key constraint violation: {0}")]
    ForeignKey(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization failure, deadlock or admin shutdown. Reported, never retried.
    #[error("Transient error: {0}")]
    Transient(String),
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        StageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        StageError::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres-errors")]
impl From<sqlx::Error> for StageError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error;
        match &err {
            Error::Configuration(_) => StageError::Connection(err.to_string()),
            Error::Database(db_err) => {
                // See: https://www.postgresql.org/docs/current/errcodes-appendix.html
                if let Some(code) = db_err.code() {
                    let code_str: &str = &code;
                    match code_str {
                        "23505" | "23P01" => return StageError::Conflict(err.to_string()),
                        "23503" => return StageError::ForeignKey(err.to_string()),
                        "23502" | "23514" => return StageError::Validation(err.to_string()),
                        // undefined_table / undefined_column
                        "42P01" | "42703" => return StageError::Schema(err.to_string()),
                        code if code.starts_with("40") => {
                            return StageError::Transient(err.to_string())
                        }
                        code if code.starts_with("08") => {
                            return StageError::Connection(err.to_string())
                        }
                        "57P01" | "57P02" | "57P03" => {
                            return StageError::Transient(err.to_string())
                        }
                        _ => {}
                    }
                }
                StageError::Database(err.to_string())
            }
            Error::Io(_) | Error::Tls(_) | Error::Protocol(_) => {
                StageError::Connection(err.to_string())
            }
            Error::RowNotFound => StageError::Query("Row not found".to_string()),
            Error::ColumnIndexOutOfBounds { .. } | Error::ColumnNotFound(_) => {
                StageError::Query(err.to_string())
            }
            Error::TypeNotFound { .. } | Error::ColumnDecode { .. } | Error::Decode(_) => {
                StageError::Serialization(err.to_string())
            }
            Error::PoolTimedOut => StageError::Timeout("Connection pool timed out".to_string()),
            Error::PoolClosed => StageError::Connection("Connection pool closed".to_string()),
            Error::WorkerCrashed => StageError::Internal("Worker thread crashed".to_string()),
            _ => StageError::Database(err.to_string()),
        }
    }
}
