//! External inference capability seam.
//!
//! The [`InferenceCapability`] trait decouples the coordination core from
//! the engine that actually loads weights and generates tokens. The worker
//! consumes this interface; it never implements inference itself. The only
//! implementation shipped here is [`UnsupportedCapability`], used on hosts
//! with no engine, so `check-capability` can answer honestly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::WorkerError;

/// Boxed future type used by capability trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Informational classification of a capability failure.
///
/// Affects the user-facing message only; the session state machine treats
/// every failure identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Download or connectivity failure while fetching model artifacts.
    Network,
    /// Memory or accelerator exhaustion.
    Resource,
    /// Anything the engine did not classify.
    Unknown,
}

/// Error raised by the inference capability.
#[derive(Debug, Clone)]
pub struct CapabilityError {
    /// Informational failure classification.
    pub class: FailureClass,
    /// Engine-provided description.
    pub message: String,
}

impl CapabilityError {
    /// Build an unclassified failure.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Unknown,
            message: message.into(),
        }
    }

    /// Human-readable message with the class prefix frontends display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.class {
            FailureClass::Network => format!("network error: {}", self.message),
            FailureClass::Resource => format!("insufficient resources: {}", self.message),
            FailureClass::Unknown => self.message.clone(),
        }
    }
}

impl From<CapabilityError> for WorkerError {
    fn from(err: CapabilityError) -> Self {
        Self::Capability(err.user_message())
    }
}

/// One observation from an in-flight initialization.
#[derive(Debug, Clone)]
pub struct LoadProgress {
    /// Completed fraction in `0.0..=1.0`.
    pub fraction: f64,
    /// Engine-provided progress text.
    pub message: String,
}

/// Callback receiving raw (unthrottled) load progress.
pub type ProgressSink = Arc<dyn Fn(LoadProgress) + Send + Sync>;

/// Bounded parameters for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Full prompt, task prefix included.
    pub prompt: String,
    /// Generation length cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling bound.
    pub top_p: f32,
}

/// A live, memory-resident compute session. Never persisted.
pub trait ModelSession: Send + Sync {
    /// Generate text for the given request.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError`] unchanged from the engine; the caller
    /// must never truncate it into a success.
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, std::result::Result<String, CapabilityError>>;
}

/// The opaque engine that performs model load and generation work.
pub trait InferenceCapability: Send + Sync {
    /// Whether this host has a usable engine at all.
    fn supported(&self) -> bool;

    /// Initialize a compute session for `session_id`, reporting progress
    /// through `progress` as the engine sees fit.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError`] if initialization fails; the worker
    /// records the failure and holds no session resources afterwards.
    fn initialize(
        &self,
        session_id: &str,
        progress: ProgressSink,
    ) -> BoxFuture<'_, std::result::Result<Arc<dyn ModelSession>, CapabilityError>>;
}

/// Capability stub for hosts without an inference engine.
///
/// `check-capability` reports unsupported and every load fails cleanly.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCapability;

impl InferenceCapability for UnsupportedCapability {
    fn supported(&self) -> bool {
        false
    }

    fn initialize(
        &self,
        _session_id: &str,
        _progress: ProgressSink,
    ) -> BoxFuture<'_, std::result::Result<Arc<dyn ModelSession>, CapabilityError>> {
        Box::pin(async {
            Err(CapabilityError::unknown(
                "no inference engine available on this host",
            ))
        })
    }
}
