//! Repository for saved result records.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::models::record::ResultRecord;
use crate::models::task::TaskKind;
use crate::{Result, WorkerError};

use super::db::Database;

/// Rows returned by `list` when the request omits a limit.
const DEFAULT_LIST_LIMIT: u32 = 50;

/// Outcome of one retention prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Rows removed by the age bound.
    pub aged_out: u64,
    /// Rows removed by the newest-first count cap.
    pub trimmed: u64,
}

/// Repository wrapper for append-only result records.
#[derive(Clone)]
pub struct ResultRepo {
    pool: Database,
}

impl ResultRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(pool: Database) -> Self {
        Self { pool }
    }

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Storage` if the insert fails.
    pub async fn insert(&self, record: &ResultRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO result \
                 (id, input_text, output_text, task_kind, session_id, created_at, source_context) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.input_text)
        .bind(&record.output_text)
        .bind(record.task_kind.as_str())
        .bind(record.session_id.as_deref())
        .bind(record.created_at.to_rfc3339())
        .bind(record.source_context.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List records newest first, capped at `limit` (or the server default
    /// when omitted).
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Storage` if the query fails or a row is
    /// unreadable.
    pub async fn list(&self, limit: Option<u32>) -> Result<Vec<ResultRecord>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let rows = sqlx::query(
            "SELECT id, input_text, output_text, task_kind, session_id, created_at, source_context \
             FROM result ORDER BY created_at DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Delete rows past the age bound, then trim to the newest `max_count`.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Storage` if either delete fails.
    pub async fn prune(&self, max_age_days: u32, max_count: u32) -> Result<PruneOutcome> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(max_age_days));

        let aged = sqlx::query("DELETE FROM result WHERE created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;

        let trimmed = sqlx::query(
            "DELETE FROM result WHERE id NOT IN \
             (SELECT id FROM result ORDER BY created_at DESC LIMIT ?)",
        )
        .bind(i64::from(max_count))
        .execute(&self.pool)
        .await?;

        Ok(PruneOutcome {
            aged_out: aged.rows_affected(),
            trimmed: trimmed.rows_affected(),
        })
    }
}

fn row_to_record(row: &SqliteRow) -> Result<ResultRecord> {
    let task_raw: String = row.try_get("task_kind")?;
    let task_kind = TaskKind::parse(&task_raw)
        .ok_or_else(|| WorkerError::Storage(format!("corrupt task_kind value: {task_raw}")))?;

    let created_raw: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_raw)
        .map_err(|err| WorkerError::Storage(format!("corrupt created_at value: {err}")))?
        .with_timezone(&Utc);

    Ok(ResultRecord {
        id: row.try_get("id")?,
        input_text: row.try_get("input_text")?,
        output_text: row.try_get("output_text")?,
        task_kind,
        session_id: row.try_get("session_id")?,
        created_at,
        source_context: row.try_get("source_context")?,
    })
}
