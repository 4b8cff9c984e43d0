/// Database Module
///
/// This module provides pooled access to the SQLite backend, organized into
/// focused submodules.
///
/// ## Architecture
///
/// - **Connection Pool** (`pool.rs`): bounded set of live connections with scoped release
/// - **Statement Execution** (`executor.rs`): placeholder translation, `query` and `execute`
/// - **Values** (`value.rs`): dynamically typed column values and result rows
///
/// ## Error Handling
///
/// All database operations use the standardized `OrmError` type. Errors raised
/// by SQLite are carried unchanged in `OrmError::Statement`.
pub mod executor;
pub mod pool;
pub mod value;

pub use executor::*;
pub use pool::*;
pub use value::*;
