//! Common utilities for imgstage
//!
//! Shared error type used by the database layer and the command-line tool.

pub mod error;

pub use error::{Result, StageError};
