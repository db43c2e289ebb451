//! Compute-session lifecycle management.
//!
//! The [`SessionManager`] is the only component that touches the
//! inference capability and the only writer of the durable `modelState`
//! record. Phases move `Unloaded → Loading → Ready`, `Loading → Error`,
//! and back to `Unloaded` via explicit unload; nothing skips `Loading`.
//!
//! The host may destroy the process at any suspension point, so every
//! durable write lands before the await whose outcome it describes: the
//! `Loading` attempt is persisted before the capability is invoked, and
//! completion persists `Ready`/`Error` before the outcome is announced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};

use crate::capability::{
    GenerationRequest, InferenceCapability, LoadProgress, ModelSession, ProgressSink,
};
use crate::config::WorkerConfig;
use crate::ipc::registry::ConnectionRegistry;
use crate::models::session::SessionPhase;
use crate::models::task::TaskKind;
use crate::persistence::state_repo::StateRepo;
use crate::protocol::{Broadcast, RunOptions};
use crate::reconciler;
use crate::{Result, WorkerError};

/// Non-blocking snapshot of the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// Selected model configuration id, when one is selected.
    pub session_id: Option<String>,
    /// Last broadcast load percentage while `Loading`.
    pub progress_percent: Option<u8>,
}

/// Outcome of [`SessionManager::begin_load`].
pub enum LoadStarted {
    /// The requested model is already loaded; no state change occurred.
    AlreadyReady(String),
    /// A load was started on a detached task.
    Started {
        /// The resolved model configuration id being loaded.
        session_id: String,
        /// Resolves when the detached load completes. Dropping it does
        /// not cancel the load; a late outcome still reaches frontends
        /// via broadcast.
        done: oneshot::Receiver<Result<String>>,
    },
}

/// Output of one generation run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Generated text.
    pub result_text: String,
    /// Task that produced it.
    pub task_kind: TaskKind,
    /// Model session the output came from.
    pub session_id: String,
    /// Completion timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Throttles raw progress fractions to whole-percent-point increments.
///
/// Emissions are strictly increasing, which keeps the broadcast stream
/// non-decreasing and bounds message volume on slow links.
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    last: Option<u8>,
}

impl ProgressThrottle {
    /// Create a throttle that has emitted nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw fraction in `0.0..=1.0`; returns a percent to emit, or
    /// `None` when the observation does not cross a whole-point boundary.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn accept(&mut self, fraction: f64) -> Option<u8> {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u8;
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }
}

struct SessionInner {
    phase: SessionPhase,
    session_id: Option<String>,
    handle: Option<Arc<dyn ModelSession>>,
    progress_percent: Option<u8>,
}

/// Owner of the compute-session lifecycle.
#[derive(Clone)]
pub struct SessionManager {
    capability: Arc<dyn InferenceCapability>,
    config: Arc<WorkerConfig>,
    state_repo: StateRepo,
    connections: ConnectionRegistry,
    inner: Arc<Mutex<SessionInner>>,
    // Single-flight gate: concurrent generations are serialized rather
    // than passed through to the capability.
    generate_gate: Arc<Mutex<()>>,
}

impl SessionManager {
    /// Create a manager in the `Unloaded` phase.
    #[must_use]
    pub fn new(
        capability: Arc<dyn InferenceCapability>,
        config: Arc<WorkerConfig>,
        state_repo: StateRepo,
        connections: ConnectionRegistry,
    ) -> Self {
        Self {
            capability,
            config,
            state_repo,
            connections,
            inner: Arc::new(Mutex::new(SessionInner {
                phase: SessionPhase::Unloaded,
                session_id: None,
                handle: None,
                progress_percent: None,
            })),
            generate_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Adopt the phase produced by a cold-start restore.
    ///
    /// Bypasses transition checks: restore output is definitionally
    /// handle-free, so only `Unloaded` and `Error` ever arrive here.
    pub async fn adopt_restored(&self, phase: SessionPhase, session_id: Option<String>) {
        let mut inner = self.inner.lock().await;
        inner.phase = phase;
        inner.session_id = session_id;
        inner.handle = None;
        inner.progress_percent = None;
    }

    /// Whether an inference engine exists on this host at all.
    #[must_use]
    pub fn has_capability(&self) -> bool {
        self.capability.supported()
    }

    /// Snapshot the current phase. Never blocks on the capability.
    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.lock().await;
        SessionStatus {
            phase: inner.phase,
            session_id: inner.session_id.clone(),
            progress_percent: inner.progress_percent,
        }
    }

    /// Begin loading a model, or confirm the one already loaded.
    ///
    /// Exactly one load may be in flight; a second attempt while
    /// `Loading` is rejected, not queued. The load itself runs on a
    /// detached task so an expired reply window never cancels it.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Busy` while a load is in flight,
    /// `WorkerError::InvalidInput` for an unknown model id, or
    /// `WorkerError::Storage` if the attempt cannot be persisted.
    pub async fn begin_load(&self, requested: Option<String>) -> Result<LoadStarted> {
        let session_id = self.config.resolve_model(requested.as_deref())?;

        {
            let mut inner = self.inner.lock().await;
            match inner.phase {
                SessionPhase::Loading => {
                    return Err(WorkerError::Busy("a model load is already in flight".into()));
                }
                SessionPhase::Ready
                    if inner.session_id.as_deref() == Some(session_id.as_str()) =>
                {
                    return Ok(LoadStarted::AlreadyReady(session_id));
                }
                // Switching models or retrying after a failure passes
                // through Unloaded; the phase machine has no direct edge.
                SessionPhase::Ready | SessionPhase::Error => {
                    inner.handle = None;
                    inner.session_id = None;
                    inner.phase = SessionPhase::Unloaded;
                }
                SessionPhase::Unloaded => {}
            }
            inner.phase = SessionPhase::Loading;
            inner.session_id = Some(session_id.clone());
            inner.progress_percent = Some(0);
        }

        // Persist the attempt before the capability runs. If the write
        // fails, roll the phase back so the worker is not stuck Busy.
        if let Err(err) =
            reconciler::persist(&self.state_repo, SessionPhase::Loading, Some(session_id.as_str()))
                .await
        {
            let mut inner = self.inner.lock().await;
            inner.phase = SessionPhase::Unloaded;
            inner.session_id = None;
            inner.progress_percent = None;
            return Err(err);
        }

        let (done_tx, done_rx) = oneshot::channel();
        self.spawn_load_task(session_id.clone(), done_tx);

        Ok(LoadStarted::Started {
            session_id,
            done: done_rx,
        })
    }

    fn spawn_load_task(&self, session_id: String, done: oneshot::Sender<Result<String>>) {
        let manager = self.clone();

        // Raw progress flows through a channel so the capability can
        // report from any thread.
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<LoadProgress>();
        let sink: ProgressSink = Arc::new(move |progress| {
            let _ = progress_tx.send(progress);
        });

        tokio::spawn(async move {
            info!(session_id = %session_id, "model load started");
            let mut throttle = ProgressThrottle::new();

            let mut init = manager.capability.initialize(&session_id, sink);

            let outcome = loop {
                tokio::select! {
                    outcome = &mut init => break outcome,
                    Some(progress) = progress_rx.recv() => {
                        manager.emit_progress(&mut throttle, progress).await;
                    }
                }
            };

            // Flush progress that was queued before completion so the
            // outcome broadcast is always the last frame of the attempt.
            while let Ok(progress) = progress_rx.try_recv() {
                manager.emit_progress(&mut throttle, progress).await;
            }

            match outcome {
                Ok(handle) => {
                    manager.complete_load(session_id, handle, done).await;
                }
                Err(err) => {
                    manager.fail_load(&err.user_message(), done).await;
                }
            }
        });
    }

    async fn emit_progress(&self, throttle: &mut ProgressThrottle, progress: LoadProgress) {
        if let Some(percent) = throttle.accept(progress.fraction) {
            {
                let mut inner = self.inner.lock().await;
                inner.progress_percent = Some(percent);
            }
            self.connections
                .broadcast(Broadcast::LoadingProgress {
                    percent,
                    message: progress.message,
                })
                .await;
        }
    }

    async fn complete_load(
        &self,
        session_id: String,
        handle: Arc<dyn ModelSession>,
        done: oneshot::Sender<Result<String>>,
    ) {
        {
            let mut inner = self.inner.lock().await;
            inner.phase = SessionPhase::Ready;
            inner.session_id = Some(session_id.clone());
            inner.handle = Some(handle);
            inner.progress_percent = None;
        }

        if let Err(err) =
            reconciler::persist(&self.state_repo, SessionPhase::Ready, Some(session_id.as_str()))
                .await
        {
            warn!(%err, "failed to persist ready state");
        }

        info!(session_id = %session_id, "model load completed");
        self.connections
            .broadcast(Broadcast::Loaded {
                session_id: session_id.clone(),
            })
            .await;
        let _ = done.send(Ok(session_id));
    }

    async fn fail_load(&self, message: &str, done: oneshot::Sender<Result<String>>) {
        {
            let mut inner = self.inner.lock().await;
            inner.phase = SessionPhase::Error;
            inner.session_id = None;
            inner.handle = None;
            inner.progress_percent = None;
        }

        if let Err(err) = reconciler::persist(&self.state_repo, SessionPhase::Error, None).await {
            warn!(%err, "failed to persist error state");
        }

        warn!(message, "model load failed");
        self.connections
            .broadcast(Broadcast::LoadingError {
                message: message.to_owned(),
            })
            .await;
        let _ = done.send(Err(WorkerError::Capability(message.to_owned())));
    }

    /// Drop the loaded session and return to `Unloaded`.
    ///
    /// A no-op when nothing is loaded.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Busy` while a load is in flight.
    pub async fn unload(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            match inner.phase {
                SessionPhase::Loading => {
                    return Err(WorkerError::Busy("a model load is in flight".into()));
                }
                SessionPhase::Unloaded => return Ok(()),
                SessionPhase::Ready | SessionPhase::Error => {
                    inner.handle = None;
                    inner.session_id = None;
                    inner.phase = SessionPhase::Unloaded;
                    inner.progress_percent = None;
                }
            }
        }

        if let Err(err) = reconciler::persist(&self.state_repo, SessionPhase::Unloaded, None).await
        {
            warn!(%err, "failed to persist unloaded state");
        }

        info!("model unloaded");
        self.connections.broadcast(Broadcast::Unloaded {}).await;
        Ok(())
    }

    /// Run a text-processing task against the loaded session.
    ///
    /// Concurrent calls are serialized through the single-flight gate;
    /// each caller's reply window keeps ticking while queued.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::InvalidInput` for empty text,
    /// `WorkerError::NotReady` unless a live session is held, or
    /// `WorkerError::Capability` with the engine's error unchanged.
    pub async fn run(
        &self,
        text: &str,
        task_kind: TaskKind,
        options: Option<RunOptions>,
        quick: bool,
    ) -> Result<RunOutput> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(WorkerError::InvalidInput("no text provided".into()));
        }

        let (handle, session_id) = {
            let inner = self.inner.lock().await;
            match (&inner.phase, &inner.handle, &inner.session_id) {
                (SessionPhase::Ready, Some(handle), Some(session_id)) => {
                    (Arc::clone(handle), session_id.clone())
                }
                _ => {
                    return Err(WorkerError::NotReady(
                        "no model loaded; load a model first".into(),
                    ));
                }
            }
        };

        let budget = if quick {
            self.config.generation.quick_max_tokens
        } else {
            self.config.generation.max_tokens
        };
        let options = options.unwrap_or_default();
        let request = GenerationRequest {
            prompt: format!("{}{trimmed}", task_kind.prompt_prefix()),
            max_tokens: options.max_tokens.map_or(budget, |m| m.min(budget)),
            temperature: options
                .temperature
                .unwrap_or(self.config.generation.temperature),
            top_p: options.top_p.unwrap_or(self.config.generation.top_p),
        };

        let _flight = self.generate_gate.lock().await;
        let result_text = handle.generate(request).await.map_err(WorkerError::from)?;

        Ok(RunOutput {
            result_text: result_text.trim().to_owned(),
            task_kind,
            session_id,
            timestamp: Utc::now(),
        })
    }

    /// Heal the "marked ready but client missing" anomaly.
    ///
    /// A `Ready` phase without a live handle means the process restarted
    /// unannounced between two ticks; downgrade to `Unloaded` and persist
    /// the downgrade. Returns whether a downgrade happened.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Storage` if the downgrade cannot be
    /// persisted.
    pub async fn reconcile_orphaned_ready(&self) -> Result<bool> {
        {
            let mut inner = self.inner.lock().await;
            if inner.phase != SessionPhase::Ready || inner.handle.is_some() {
                return Ok(false);
            }
            warn!(
                session_id = ?inner.session_id,
                "session marked ready without a live handle; downgrading"
            );
            inner.phase = SessionPhase::Unloaded;
            inner.session_id = None;
            inner.progress_percent = None;
        }

        reconciler::persist(&self.state_repo, SessionPhase::Unloaded, None).await?;
        Ok(true)
    }
}
