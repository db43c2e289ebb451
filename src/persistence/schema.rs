//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every worker start. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `WorkerError::Storage` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS worker_state (
    key               TEXT PRIMARY KEY NOT NULL,
    phase             TEXT NOT NULL CHECK(phase IN ('unloaded','loading','ready','error')),
    session_id        TEXT,
    saved_at_epoch_ms INTEGER NOT NULL,
    schema_version    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS result (
    id              TEXT PRIMARY KEY NOT NULL,
    input_text      TEXT NOT NULL,
    output_text     TEXT NOT NULL,
    task_kind       TEXT NOT NULL CHECK(task_kind IN ('summarize','rewrite','counter','question')),
    session_id      TEXT,
    created_at      TEXT NOT NULL,
    source_context  TEXT
);

CREATE INDEX IF NOT EXISTS idx_result_created ON result(created_at);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
