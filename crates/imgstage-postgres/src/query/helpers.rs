//! Identifier helpers.
//!
//! Values are always bound as parameters; identifiers cannot be, so every
//! table and column name is validated and quoted before it reaches SQL text.

use crate::{Result, StageError};
use unicode_normalization::UnicodeNormalization;

/// PostgreSQL truncates identifiers longer than this many bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

const SQL_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "drop", "create", "alter",
    "truncate", "grant", "revoke", "union", "table", "index", "view",
    "schema", "database", "user", "role", "from", "where", "join", "on",
    "using", "and", "or", "not", "in", "is", "null", "true", "false",
    "as", "order", "by", "group", "having", "limit", "offset", "into",
];

/// Quotes a SQL identifier.
///
/// Schema-qualified names get each part quoted separately.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Quotes a type name read from the catalog, doubling embedded quotes.
pub fn quote_type_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validates a table or column name, optionally schema-qualified (`public.images`).
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StageError::Validation("Identifier cannot be empty".to_string()));
    }

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(StageError::Validation(format!(
            "Invalid identifier '{}': expected 'table' or 'schema.table'",
            name
        )));
    }

    parts.into_iter().try_for_each(validate_identifier_part)
}

/// Validates a single identifier part (no dots).
pub fn validate_identifier_part(name: &str) -> Result<()> {
    // NFKC first so confusable code points cannot slip past the ASCII checks
    let name = name.nfkc().collect::<String>();

    let first = name
        .chars()
        .next()
        .ok_or_else(|| StageError::Validation("Identifier part cannot be empty".to_string()))?;

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(StageError::Validation(format!(
            "Identifier '{}' exceeds maximum length of {}",
            name, MAX_IDENTIFIER_LEN
        )));
    }

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(StageError::Validation(format!(
            "Identifier '{}' must start with a letter or underscore",
            name
        )));
    }

    if let Some(ch) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(StageError::Validation(format!(
            "Identifier '{}' contains invalid character '{}'",
            name, ch
        )));
    }

    let lower = name.to_lowercase();
    if lower.starts_with("pg_") || lower == "information_schema" {
        return Err(StageError::Validation(format!(
            "Access to system catalog '{}' is not allowed",
            name
        )));
    }

    if SQL_KEYWORDS.contains(&lower.as_str()) {
        return Err(StageError::Validation(format!(
            "Identifier '{}' is a reserved SQL keyword",
            name
        )));
    }

    Ok(())
}

/// Name of the scratch table that holds the join of `images` and `labels`.
pub fn temp_table_name(images_table: &str, labels_table: &str) -> String {
    format!("{}_{}_tmp", images_table, labels_table)
}
