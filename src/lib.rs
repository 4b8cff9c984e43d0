//! rowmap: declarative record mapping over a bounded async SQLite pool.
//!
//! Entities are declared as a list of typed fields; the SQL to select,
//! insert, update and delete their rows is derived once per entity and run
//! through a shared connection pool.

// Core infrastructure modules
pub mod config;
pub mod core;

// Mapping engine
pub mod model;

#[cfg(test)]
mod test_utils;

pub use crate::config::PoolConfig;
pub use crate::core::db::{Executor, Pool, PoolStatus, Row, ScopedConnection, Value};
pub use crate::core::{OrmError, Result, SchemaError};
pub use crate::model::{Entity, FieldDescriptor, Record, RecordSchema};
