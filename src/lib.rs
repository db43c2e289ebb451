#![forbid(unsafe_code)]

//! Ephemeral worker coordination core for an on-device LLM assistant.
//!
//! The host may suspend and resurrect this process at any time, losing
//! all in-memory state; the modules here keep the expensive compute
//! session consistent with durable storage across those cycles while
//! serving a request/response and broadcast protocol to any number of
//! frontend processes.

pub mod capability;
pub mod config;
pub mod context;
pub mod errors;
pub mod ipc;
pub mod maintenance;
pub mod models;
pub mod persistence;
pub mod protocol;
pub mod reconciler;
pub mod revival;
pub mod router;
pub mod session;

pub use config::WorkerConfig;
pub use errors::{Result, WorkerError};
