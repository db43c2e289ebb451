//! Error types shared across the worker.

use std::fmt::{Display, Formatter};

/// Shared worker result type.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Worker error enumeration covering all domain failure modes.
///
/// The first six variants mirror the protocol error taxonomy and are the
/// only ones that cross the IPC boundary; `Config` and `Ipc` cover
/// bootstrap and transport failures that never reach a frontend.
#[derive(Debug)]
pub enum WorkerError {
    /// An operation of the same kind is already in flight — a rejection,
    /// not a fault.
    Busy(String),
    /// Operation requires a ready session.
    NotReady(String),
    /// Request payload is missing or empty where content is required.
    InvalidInput(String),
    /// The external inference capability raised an error.
    Capability(String),
    /// No reply was produced within the request's time ceiling.
    Timeout(String),
    /// Durable read or write failed.
    Storage(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// IPC transport failure.
    Ipc(String),
}

impl WorkerError {
    /// Stable machine-readable code used in error reply payloads.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Busy(_) => "busy",
            Self::NotReady(_) => "not_ready",
            Self::InvalidInput(_) => "invalid_input",
            Self::Capability(_) => "capability_failure",
            Self::Timeout(_) => "timeout",
            Self::Storage(_) => "storage_failure",
            Self::Config(_) => "config",
            Self::Ipc(_) => "ipc",
        }
    }
}

impl Display for WorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy(msg) => write!(f, "busy: {msg}"),
            Self::NotReady(msg) => write!(f, "not ready: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Capability(msg) => write!(f, "capability: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Storage(msg) => write!(f, "storage: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<toml::de::Error> for WorkerError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for WorkerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("malformed payload: {err}"))
    }
}
