//! PostgreSQL statement building.
//!
//! Values are bound as `$n` parameters; table and column names are validated
//! and quoted.
//!
//! # Examples
//!
//! ## INSERT with a generated identifier
//!
//! ```ignore
//! use imgstage_postgres::{QueryBuilder, Value};
//!
//! let qb = QueryBuilder::new("images")?.returning("image_id")?;
//! let values = vec![
//!     ("filepath".to_string(), Value::from("bdd100k/images/a.jpg")),
//!     ("x_res".to_string(), Value::Int(1280)),
//! ];
//! let (sql, params) = qb.build_insert(&values)?;
//! // INSERT INTO "images" ("filepath", "x_res") VALUES ($1, $2) RETURNING "image_id"
//! ```
//!
//! ## Lookup by key
//!
//! ```ignore
//! let qb = QueryBuilder::new("images")?
//!     .where_eq("filepath", Value::from("bdd100k/images/a.jpg"))?
//!     .limit(1);
//! let (sql, params) = qb.build_select();
//! // SELECT * FROM "images" WHERE "filepath" = $1 LIMIT $2
//! ```

mod helpers;
mod builder;
mod select;
mod modify;

#[cfg(test)]
mod tests;

pub use builder::QueryBuilder;
pub use helpers::{quote_identifier, quote_type_name, temp_table_name, validate_identifier};
pub use modify::build_drop_table;
pub use select::build_select_into_join;
