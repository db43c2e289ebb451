//! `SQLite` connection bootstrap.

use std::fs;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::WorkerConfig;
use crate::{Result, WorkerError};

use super::schema;

/// Alias for the shared `SQLite` pool.
pub type Database = SqlitePool;

/// Open the file-backed database under the configured data directory and
/// apply the schema.
///
/// # Errors
///
/// Returns `WorkerError::Storage` if the directory cannot be created, the
/// connection fails, or schema application fails.
pub async fn connect(config: &WorkerConfig) -> Result<Database> {
    fs::create_dir_all(&config.data_dir)
        .map_err(|err| WorkerError::Storage(format!("failed to create data dir: {err}")))?;

    let options = SqliteConnectOptions::new()
        .filename(config.db_path())
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}

/// Open an in-memory database for tests and apply the schema.
///
/// Capped at one connection — each `SQLite` in-memory connection is its
/// own database.
///
/// # Errors
///
/// Returns `WorkerError::Storage` if the connection or schema fails.
pub async fn connect_memory() -> Result<Database> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}
