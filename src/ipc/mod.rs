//! IPC transport: connection registry and the local socket server.

pub mod registry;
pub mod server;
