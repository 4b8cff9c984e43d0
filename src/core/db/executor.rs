/// Statement Execution Module
///
/// Runs parameterized SQL through the connection pool. Each call acquires a
/// single connection for the duration of one statement and releases it
/// before returning, whether the statement succeeded or not.

use crate::core::db::pool::{self, Pool};
use crate::core::db::value::{Row, Value};
use crate::core::Result;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

/// Query execution service bound to a connection pool.
#[derive(Debug, Clone)]
pub struct Executor {
    pool: Pool,
}

impl Executor {
    /// Creates an executor that draws connections from `pool`.
    pub fn new(pool: Pool) -> Self {
        Executor { pool }
    }

    /// Creates an executor on the process-wide pool.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::NotInitialized` if `pool::init_global` has not run.
    pub fn global() -> Result<Self> {
        Ok(Executor::new(pool::global()?))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Executes a read statement and returns its rows.
    ///
    /// # Arguments
    ///
    /// * `sql` - statement using `?` placeholders
    /// * `args` - values bound positionally to the placeholders
    /// * `limit` - fetch at most this many rows; `None` fetches all of them
    ///
    /// # Errors
    ///
    /// Pool errors from acquisition, or `OrmError::Statement` carrying the
    /// SQLite error unchanged.
    pub async fn query(&self, sql: &str, args: &[Value], limit: Option<usize>) -> Result<Vec<Row>> {
        debug!(sql = %sql, args = args.len(), "select");
        let native = translate_placeholders(sql);
        let args = args.to_vec();

        let conn = self.pool.acquire().await?;
        let rows = conn
            .run(move |c| fetch_rows(c, &native, &args, limit))
            .await?;
        drop(conn);

        info!(rows = rows.len(), "rows returned");
        Ok(rows)
    }

    /// Executes a mutating statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Pool errors from acquisition, or `OrmError::Statement` carrying the
    /// SQLite error unchanged. Nothing is retried.
    pub async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        debug!(sql = %sql, args = args.len(), "execute");
        let native = translate_placeholders(sql);
        let args = args.to_vec();

        let conn = self.pool.acquire().await?;
        let affected = conn
            .run(move |c| {
                let mut stmt = c.prepare(&native)?;
                Ok(stmt.execute(params_from_iter(args.iter()))? as u64)
            })
            .await?;
        drop(conn);

        info!(affected, "rows affected");
        Ok(affected)
    }
}

fn fetch_rows(conn: &mut Connection, sql: &str, args: &[Value], limit: Option<usize>) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut result = Vec::new();
    let mut rows = stmt.query(params_from_iter(args.iter()))?;
    while limit.map_or(true, |max| result.len() < max) {
        let Some(row) = rows.next()? else { break };
        let mut mapped = Row::new();
        for (i, column) in columns.iter().enumerate() {
            mapped.push(column.clone(), Value::from(row.get_ref(i)?));
        }
        result.push(mapped);
    }
    Ok(result)
}

/// Rewrites portable `?` placeholders into SQLite's numbered form `?1, ?2, ...`.
///
/// Question marks inside string literals, quoted identifiers and comments
/// are kept as is.
pub fn translate_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        out.push(ch);
        match ch {
            '?' => {
                index += 1;
                out.push_str(&index.to_string());
            }
            '\'' | '"' | '`' | '[' => {
                let end = if ch == '[' { ']' } else { ch };
                for c in chars.by_ref() {
                    out.push(c);
                    if c == end {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    out.push(c);
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.extend(chars.next());
                let mut prev = None;
                for c in chars.by_ref() {
                    out.push(c);
                    if prev == Some('*') && c == '/' {
                        break;
                    }
                    prev = Some(c);
                }
            }
            _ => {}
        }
    }
    out
}
