/// # Test Utilities Module
///
/// Isolated on-disk databases for pool, executor and record tests. Each
/// fixture lives in its own temporary directory, so tests can run in
/// parallel without sharing state.

use crate::config::PoolConfig;
use crate::core::db::{Executor, Pool};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber once; controlled by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A throwaway SQLite database file
#[derive(Debug)]
pub struct TestDatabase {
    _dir: TempDir,
    path: String,
}

impl TestDatabase {
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db").to_string_lossy().into_owned();
        TestDatabase { _dir: dir, path }
    }

    /// Pool configuration pointing at this database with a short acquire timeout.
    pub fn config(&self) -> PoolConfig {
        PoolConfig::new(self.path.clone()).acquire_timeout(Duration::from_secs(5))
    }

    /// An executor over a fresh pool of at most `maxsize` connections.
    pub async fn executor(&self, maxsize: usize) -> Executor {
        let pool = Pool::initialize(self.config().maxsize(maxsize))
            .await
            .expect("Failed to initialize test pool");
        Executor::new(pool)
    }
}
