/// Connection Pool Module
///
/// This module provides a bounded, asynchronous pool of SQLite connections
/// on top of `deadpool-sqlite`. Connections are handed out as
/// `ScopedConnection`s that return themselves to the pool when dropped, on
/// success and failure paths alike.

use crate::config::PoolConfig;
use crate::core::{OrmError, Result};
use deadpool_sqlite::{InteractError, Manager, Object, PoolError, Runtime};
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Process-wide pool slot for applications that prefer a single shared pool.
static GLOBAL_POOL: OnceCell<Pool> = OnceCell::new();

/// Snapshot of the pool's occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Live connections (idle + in use)
    pub size: usize,
    /// Connections waiting in the pool
    pub idle: usize,
    /// Connections currently held by callers
    pub in_use: usize,
    /// Upper bound on live connections
    pub max: usize,
}

/// Bounded pool of SQLite connections.
///
/// `Pool` is a cheap handle; clones share the same connections.
#[derive(Clone)]
pub struct Pool {
    inner: deadpool_sqlite::Pool,
    config: Arc<PoolConfig>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}

impl Pool {
    /// Creates a pool and opens `minsize` connections up front.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Config` for invalid bounds or options and
    /// `OrmError::Statement` if an initial connection cannot be opened.
    pub async fn initialize(config: PoolConfig) -> Result<Self> {
        let path = config.validate()?.to_string();
        info!(
            db = %path,
            host = %config.host,
            port = config.port,
            user = %config.user,
            minsize = config.minsize,
            maxsize = config.maxsize,
            "create database connection pool"
        );

        let manager = Manager::from_config(&deadpool_sqlite::Config::new(path), Runtime::Tokio1);
        let inner = deadpool_sqlite::Pool::builder(manager)
            .max_size(config.maxsize)
            .wait_timeout(Some(config.acquire_timeout_duration()))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|err| OrmError::Config(err.to_string()))?;
        let pool = Pool {
            inner,
            config: Arc::new(config),
        };

        // held together so each checkout opens a distinct connection
        let mut warm = Vec::with_capacity(pool.config.minsize);
        for _ in 0..pool.config.minsize {
            warm.push(pool.acquire().await?);
        }
        drop(warm);

        Ok(pool)
    }

    /// Waits for a free connection slot and hands out a connection.
    ///
    /// Reuses an idle connection if there is one, otherwise opens a new one.
    /// Dropping the returned future before it completes releases anything it
    /// had reserved.
    ///
    /// # Errors
    ///
    /// `OrmError::PoolExhausted` if no slot frees up within the configured
    /// acquire timeout, `OrmError::PoolClosed` after `close`.
    pub async fn acquire(&self) -> Result<ScopedConnection> {
        if self.is_closed() {
            return Err(OrmError::PoolClosed);
        }
        match self.inner.get().await {
            Ok(object) => Ok(ScopedConnection {
                object,
                busy_timeout: self.config.busy_timeout_duration(),
            }),
            Err(PoolError::Timeout(_)) => {
                warn!(timeout_ms = self.config.acquire_timeout_ms, "connection pool exhausted");
                Err(OrmError::PoolExhausted {
                    timeout: self.config.acquire_timeout_duration(),
                })
            }
            Err(PoolError::Closed) => Err(OrmError::PoolClosed),
            Err(PoolError::Backend(err)) => Err(OrmError::Statement(err)),
            Err(err) => Err(OrmError::Task(err.to_string())),
        }
    }

    /// Closes the pool.
    ///
    /// Idle connections are closed immediately, connections still held by
    /// callers are closed when released, and further `acquire` calls fail
    /// with `OrmError::PoolClosed`.
    pub fn close(&self) {
        if self.inner.is_closed() {
            return;
        }
        let status = self.inner.status();
        self.inner.close();
        info!(size = status.size, "close database connection pool");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn status(&self) -> PoolStatus {
        let max = self.config.maxsize;
        let status = self.inner.status();
        if self.is_closed() {
            return PoolStatus {
                size: status.size,
                idle: 0,
                in_use: 0,
                max,
            };
        }
        // negative availability counts waiters, not connections
        let idle = (status.available.max(0) as usize).min(status.size);
        PoolStatus {
            size: status.size,
            idle,
            in_use: status.size - idle,
            max,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

/// A pooled connection that goes back to its pool when dropped.
pub struct ScopedConnection {
    object: Object,
    busy_timeout: Duration,
}

impl fmt::Debug for ScopedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedConnection")
            .field("busy_timeout", &self.busy_timeout)
            .finish_non_exhaustive()
    }
}

impl ScopedConnection {
    /// Runs `f` against the connection on the blocking thread pool.
    ///
    /// The connection stays locked by `f` until it returns, even if the
    /// calling future is dropped first. A later checkout of the same
    /// connection waits for it, so an abandoned statement never runs next
    /// to a second connection beyond the pool's bound.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let busy_timeout = self.busy_timeout;
        let outcome = self
            .object
            .interact(move |conn: &mut Connection| -> Result<T> {
                conn.busy_timeout(busy_timeout)?;
                f(conn)
            })
            .await;
        match outcome {
            Ok(result) => result,
            Err(InteractError::Panic(payload)) => std::panic::resume_unwind(payload),
            Err(err) => Err(OrmError::Task(err.to_string())),
        }
    }
}

/// Initializes the process-wide pool.
///
/// # Errors
///
/// `OrmError::AlreadyInitialized` on a second call; otherwise the errors of
/// `Pool::initialize`.
pub async fn init_global(config: PoolConfig) -> Result<Pool> {
    if GLOBAL_POOL.get().is_some() {
        return Err(OrmError::AlreadyInitialized);
    }
    let pool = Pool::initialize(config).await?;
    if GLOBAL_POOL.set(pool.clone()).is_err() {
        pool.close();
        return Err(OrmError::AlreadyInitialized);
    }
    Ok(pool)
}

/// Returns the process-wide pool, or `OrmError::NotInitialized` before `init_global`.
pub fn global() -> Result<Pool> {
    GLOBAL_POOL.get().cloned().ok_or(OrmError::NotInitialized)
}
