//! Durable state store: SQLite connection, schema, and repositories.

pub mod db;
pub mod result_repo;
pub mod schema;
pub mod state_repo;
