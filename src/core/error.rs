/// Rowmap Error Module
///
/// This module defines the error types shared by the pool, the statement
/// executor and the mapping engine. Database failures keep their original
/// `rusqlite::Error` as the source so callers can inspect the cause.
use std::time::Duration;
use thiserror::Error;

/// Errors raised while deriving a `RecordSchema` from field declarations.
///
/// These only occur at registration time; a schema that built successfully
/// is never re-validated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// More than one field was marked as primary key
    #[error("duplicate primary key in {entity}: `{first}` and `{second}`")]
    DuplicatePrimaryKey {
        entity: String,
        first: String,
        second: String,
    },

    /// No field was marked as primary key
    #[error("missing primary key in {entity}")]
    MissingPrimaryKey { entity: String },

    /// The same attribute was declared twice
    #[error("duplicate field `{field}` in {entity}")]
    DuplicateField { entity: String, field: String },

    /// Two attributes map onto the same column
    #[error("duplicate column `{column}` in {entity}")]
    DuplicateColumn { entity: String, column: String },

    /// Entity, table, attribute or column name is empty
    #[error("empty name in {entity}: {what}")]
    EmptyName { entity: String, what: &'static str },
}

/// Comprehensive error type for rowmap.
#[derive(Error, Debug)]
pub enum OrmError {
    /// Bad entity declaration
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Pool operations attempted before the pool was set up
    #[error("Connection pool is not initialized")]
    NotInitialized,

    /// The process-wide pool was initialized twice
    #[error("Connection pool is already initialized")]
    AlreadyInitialized,

    /// No connection became available within the acquire timeout
    #[error("Connection pool exhausted: no connection available after {timeout:?}")]
    PoolExhausted { timeout: Duration },

    /// The pool has been closed
    #[error("Connection pool is closed")]
    PoolClosed,

    /// The database rejected a statement, or a connection could not be opened
    #[error("Database error: {0}")]
    Statement(#[from] rusqlite::Error),

    /// A write touched a different number of rows than required
    #[error("Unexpected affected row count: expected {expected}, got {actual}")]
    UnexpectedRowCount { expected: u64, actual: u64 },

    /// A record accessor named an attribute its schema does not declare
    #[error("Unknown field `{field}` on {entity}")]
    UnknownField { entity: String, field: String },

    /// A stored value could not be converted to the requested Rust type
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking database task was cancelled by runtime shutdown
    #[error("Task error: {0}")]
    Task(String),
}

impl OrmError {
    /// Returns the underlying database error, if this is one.
    pub fn database_error(&self) -> Option<&rusqlite::Error> {
        match self {
            OrmError::Statement(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the caller may reasonably retry the operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrmError::PoolExhausted { .. })
    }
}

/// Type alias for Result to use OrmError as the error type.
pub type Result<T> = std::result::Result<T, OrmError>;
