//! Session phase machine and the durable state mirror.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Version stamp written with every persisted state record. Mismatched
/// records are discarded on restore.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Lifecycle phase of the compute session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session resources held.
    Unloaded,
    /// Capability initialization in flight.
    Loading,
    /// Live handle held; generation requests accepted.
    Ready,
    /// Last initialization failed; explicit unload or reload required.
    Error,
}

impl SessionPhase {
    /// Wire spelling, matching the serde representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Parse the wire spelling back into a phase.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unloaded" => Some(Self::Unloaded),
            "loading" => Some(Self::Loading),
            "ready" => Some(Self::Ready),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    ///
    /// `Unloaded → Ready` is deliberately absent: every load passes
    /// through `Loading`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unloaded, Self::Loading)
                | (Self::Loading, Self::Ready | Self::Error)
                | (Self::Ready | Self::Error, Self::Unloaded)
        )
    }
}

/// Durable mirror of the session state.
///
/// Only ever a hint: `Ready` in storage attests that a session *was*
/// believed ready, never that one exists now. The reconciler downgrades
/// it before any compute request is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PersistedState {
    /// Last observed phase.
    pub phase: SessionPhase,
    /// Identifier of the model configuration, when one was selected.
    pub session_id: Option<String>,
    /// Write time in epoch milliseconds, used for the staleness bound.
    pub saved_at_epoch_ms: i64,
    /// Schema version stamp.
    pub schema_version: u32,
}

impl PersistedState {
    /// Snapshot the given phase and session id at the current instant.
    #[must_use]
    pub fn now(phase: SessionPhase, session_id: Option<String>) -> Self {
        Self {
            phase,
            session_id,
            saved_at_epoch_ms: Utc::now().timestamp_millis(),
            schema_version: STATE_SCHEMA_VERSION,
        }
    }

    /// Whether the record is older than `bound_ms` as of `now_epoch_ms`.
    #[must_use]
    pub fn is_stale(&self, bound_ms: i64, now_epoch_ms: i64) -> bool {
        now_epoch_ms.saturating_sub(self.saved_at_epoch_ms) > bound_ms
    }
}
