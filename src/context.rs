//! Shared worker context, constructed once at process start.
//!
//! Everything handlers touch hangs off this struct and is passed
//! explicitly; there is no ambient global state to go stale across a
//! host-forced restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::capability::InferenceCapability;
use crate::config::WorkerConfig;
use crate::ipc::registry::ConnectionRegistry;
use crate::persistence::db::Database;
use crate::persistence::result_repo::ResultRepo;
use crate::persistence::state_repo::StateRepo;
use crate::router::PendingRequest;
use crate::session::SessionManager;

/// The most recent text selection reported by a frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selected text.
    pub text: String,
    /// Originating page or surface.
    pub context: Option<String>,
}

/// Shared state for all request handlers and background tasks.
pub struct WorkerContext {
    /// Worker configuration.
    pub config: Arc<WorkerConfig>,
    /// Durable session-state repository.
    pub state_repo: StateRepo,
    /// Saved-results repository.
    pub result_repo: ResultRepo,
    /// Compute-session owner.
    pub session: SessionManager,
    /// Live frontend connections.
    pub connections: ConnectionRegistry,
    /// Most recent selection, used as the quick-run fallback input.
    pub last_selection: Mutex<Option<Selection>>,
    /// Requests currently awaiting a reply or timeout, by request id.
    pub pending: Mutex<HashMap<String, PendingRequest>>,
}

impl WorkerContext {
    /// Wire up repositories, the connection registry, and the session
    /// manager over the given pool and capability.
    #[must_use]
    pub fn new(
        config: Arc<WorkerConfig>,
        pool: Database,
        capability: Arc<dyn InferenceCapability>,
    ) -> Self {
        let state_repo = StateRepo::new(pool.clone());
        let result_repo = ResultRepo::new(pool);
        let connections = ConnectionRegistry::new();
        let session = SessionManager::new(
            capability,
            Arc::clone(&config),
            state_repo.clone(),
            connections.clone(),
        );

        Self {
            config,
            state_repo,
            result_repo,
            session,
            connections,
            last_selection: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
        }
    }
}
