//! Repository for the single `modelState` row.
//!
//! The session manager is the sole writer-of-record for this key; every
//! write is a full-value overwrite, so last-write-wins is safe.

use sqlx::Row;

use crate::models::session::{PersistedState, SessionPhase};
use crate::{Result, WorkerError};

use super::db::Database;

/// Key of the one durable session-state record.
const STATE_KEY: &str = "modelState";

/// Repository wrapper for the durable session-state mirror.
#[derive(Clone)]
pub struct StateRepo {
    pool: Database,
}

impl StateRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(pool: Database) -> Self {
        Self { pool }
    }

    /// Read the persisted state, if any record exists.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Storage` if the query fails or the stored
    /// phase is unreadable.
    pub async fn get(&self) -> Result<Option<PersistedState>> {
        let row = sqlx::query(
            "SELECT phase, session_id, saved_at_epoch_ms, schema_version \
             FROM worker_state WHERE key = ?",
        )
        .bind(STATE_KEY)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let phase_raw: String = row.try_get("phase")?;
        let phase = SessionPhase::parse(&phase_raw)
            .ok_or_else(|| WorkerError::Storage(format!("corrupt phase value: {phase_raw}")))?;
        let schema_version: i64 = row.try_get("schema_version")?;

        Ok(Some(PersistedState {
            phase,
            session_id: row.try_get("session_id")?,
            saved_at_epoch_ms: row.try_get("saved_at_epoch_ms")?,
            schema_version: u32::try_from(schema_version)
                .map_err(|_| WorkerError::Storage("corrupt schema_version".into()))?,
        }))
    }

    /// Write the state, unconditionally overwriting any previous record.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Storage` if the upsert fails.
    pub async fn save(&self, state: &PersistedState) -> Result<()> {
        sqlx::query(
            "INSERT INTO worker_state (key, phase, session_id, saved_at_epoch_ms, schema_version) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET \
                 phase = excluded.phase, \
                 session_id = excluded.session_id, \
                 saved_at_epoch_ms = excluded.saved_at_epoch_ms, \
                 schema_version = excluded.schema_version",
        )
        .bind(STATE_KEY)
        .bind(state.phase.as_str())
        .bind(state.session_id.as_deref())
        .bind(state.saved_at_epoch_ms)
        .bind(i64::from(state.schema_version))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete the state record.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Storage` if the delete fails.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM worker_state WHERE key = ?")
            .bind(STATE_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
