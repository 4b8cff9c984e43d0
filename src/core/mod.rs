/// Core Module for rowmap
///
/// Shared infrastructure: the connection pool, statement execution,
/// database values and the crate error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{OrmError, Result, SchemaError};
