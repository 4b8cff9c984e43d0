use crate::core::{OrmError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Connection pool configuration.
///
/// Every option has a default, so an empty `[pool]` table is valid apart
/// from the database path, which `validate` requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Path of the SQLite database file.
    pub db: Option<String>,
    pub charset: String,
    pub autocommit: bool,
    pub minsize: usize,
    pub maxsize: usize,
    /// How long `acquire` waits for a free connection.
    pub acquire_timeout_ms: u64,
    /// How long a statement waits on a locked database file.
    pub busy_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            db: None,
            charset: "utf8".to_string(),
            autocommit: true,
            minsize: 1,
            maxsize: 10,
            acquire_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
        }
    }
}

impl PoolConfig {
    /// Creates a configuration for the database at `db` with all other options defaulted.
    pub fn new(db: impl Into<String>) -> Self {
        PoolConfig {
            db: Some(db.into()),
            ..PoolConfig::default()
        }
    }

    pub fn minsize(mut self, minsize: usize) -> Self {
        self.minsize = minsize;
        self
    }

    pub fn maxsize(mut self, maxsize: usize) -> Self {
        self.maxsize = maxsize;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn acquire_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn busy_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Checks the bounds and backend constraints, returning the database path.
    pub fn validate(&self) -> Result<&str> {
        let db = match self.db.as_deref() {
            Some(db) if !db.trim().is_empty() => db,
            _ => return Err(OrmError::Config("database path (`db`) is not set".to_string())),
        };
        if db == ":memory:" && self.maxsize > 1 {
            return Err(OrmError::Config(
                "`:memory:` databases are private to one connection; set maxsize = 1 or use a file".to_string(),
            ));
        }
        if self.maxsize == 0 {
            return Err(OrmError::Config("maxsize must be at least 1".to_string()));
        }
        if self.minsize > self.maxsize {
            return Err(OrmError::Config(format!(
                "minsize ({}) exceeds maxsize ({})",
                self.minsize, self.maxsize
            )));
        }
        match self.charset.to_ascii_lowercase().as_str() {
            "utf8" | "utf8mb4" | "utf-8" => {}
            other => {
                return Err(OrmError::Config(format!(
                    "unsupported charset `{}`: SQLite text is stored as UTF-8",
                    other
                )))
            }
        }
        if !self.autocommit {
            return Err(OrmError::Config(
                "autocommit = false is not supported; connections always run in autocommit mode".to_string(),
            ));
        }
        Ok(db)
    }
}

/// Parses configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| OrmError::Config(e.to_string()))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = rowmap::config::load_config("rowmap.toml").expect("Failed to load config");
/// println!("{:?}", config.pool);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
