// SQLite Connection Pool Setup

use crate::error::map_sqlx_error;
use jobqueue_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Maximum pooled connections (one writer at a time under WAL, many readers)
const MAX_CONNECTIONS: u32 = 10;

/// How long a statement waits on a locked database before SQLITE_BUSY
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create SQLite connection pool with WAL mode and a busy timeout
///
/// Accepts any sqlx SQLite URL (`sqlite::memory:`, `sqlite:///path/jobs.db`).
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("Invalid database URL {}: {}", database_url, e)))?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)?;

    Ok(pool)
}

/// Build a sqlx URL for a database file, creating the parent directory
pub fn database_url(path: &Path) -> Result<String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!(
                    "Cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(format!("sqlite://{}", path.display()))
}
