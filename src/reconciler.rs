//! State reconciliation between memory and durable storage.
//!
//! The host can destroy the worker at any point with no shutdown hook,
//! so every observation of "session ready" must be self-verifying. The
//! durable record only ever attests that a session *was* believed ready;
//! [`restore`] downgrades it on cold start, and [`sync`] heals the case
//! where the process restarted unannounced between two ticks.

use chrono::Utc;
use tracing::info;

use crate::models::session::{PersistedState, SessionPhase, STATE_SCHEMA_VERSION};
use crate::persistence::state_repo::StateRepo;
use crate::session::SessionManager;
use crate::Result;

/// Phase and session id adopted by the session manager after a restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredState {
    /// Phase to adopt. Never `Loading` or `Ready`: a live handle cannot
    /// have survived a cold start.
    pub phase: SessionPhase,
    /// Session id to adopt; populated only for phases that may carry one.
    pub session_id: Option<String>,
}

impl RestoredState {
    fn unloaded() -> Self {
        Self {
            phase: SessionPhase::Unloaded,
            session_id: None,
        }
    }
}

/// Read the persisted state and decide what memory may trust.
///
/// Absent, stale (older than the staleness bound), or schema-mismatched
/// records reset durable state to `Unloaded` and yield the same. Fresh
/// records are adopted with `Loading`/`Ready` forced down to `Unloaded`.
///
/// # Errors
///
/// Returns `WorkerError::Storage` if the read or the reset write fails.
pub async fn restore(repo: &StateRepo, staleness_minutes: u64) -> Result<RestoredState> {
    let bound_ms = i64::try_from(staleness_minutes).unwrap_or(i64::MAX) * 60 * 1000;
    let now_ms = Utc::now().timestamp_millis();

    let Some(persisted) = repo.get().await? else {
        info!("no persisted state; starting unloaded");
        repo.save(&PersistedState::now(SessionPhase::Unloaded, None))
            .await?;
        return Ok(RestoredState::unloaded());
    };

    if persisted.schema_version != STATE_SCHEMA_VERSION {
        info!(
            found = persisted.schema_version,
            expected = STATE_SCHEMA_VERSION,
            "persisted state schema mismatch; resetting"
        );
        repo.save(&PersistedState::now(SessionPhase::Unloaded, None))
            .await?;
        return Ok(RestoredState::unloaded());
    }

    if persisted.is_stale(bound_ms, now_ms) {
        info!(
            saved_at_epoch_ms = persisted.saved_at_epoch_ms,
            "persisted state is stale; resetting"
        );
        repo.save(&PersistedState::now(SessionPhase::Unloaded, None))
            .await?;
        return Ok(RestoredState::unloaded());
    }

    // A durable Ready/Loading attests only that a session was believed
    // live before the last suspension; the handle itself is gone.
    let restored = match persisted.phase {
        SessionPhase::Loading | SessionPhase::Ready | SessionPhase::Unloaded => {
            RestoredState::unloaded()
        }
        SessionPhase::Error => RestoredState {
            phase: SessionPhase::Error,
            session_id: None,
        },
    };

    info!(
        persisted_phase = persisted.phase.as_str(),
        adopted_phase = restored.phase.as_str(),
        "restored persisted state"
    );
    Ok(restored)
}

/// Write the given phase and session id to durable storage,
/// unconditionally overwriting the previous record.
///
/// # Errors
///
/// Returns `WorkerError::Storage` if the write fails.
pub async fn persist(
    repo: &StateRepo,
    phase: SessionPhase,
    session_id: Option<&str>,
) -> Result<()> {
    repo.save(&PersistedState::now(
        phase,
        session_id.map(ToOwned::to_owned),
    ))
    .await
}

/// Opportunistic memory↔storage comparison, run on each maintenance
/// tick. Downgrades an in-memory `Ready` with no live handle — the
/// direct symptom of an unannounced restart. Returns whether a
/// downgrade happened.
///
/// # Errors
///
/// Returns `WorkerError::Storage` if the downgrade cannot be persisted.
pub async fn sync(session: &SessionManager) -> Result<bool> {
    session.reconcile_orphaned_ready().await
}
