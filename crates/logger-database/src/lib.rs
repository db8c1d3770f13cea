//! SQLite storage layer for the stream logger.
//!
//! This crate provides:
//! - A single-connection [`Database`] with WAL mode for file-backed stores
//! - Versioned schema migrations
//! - Model types for the three logical tables
//!
//! # Tables
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `pending_points` | Buffered data points that have not been uploaded yet |
//! | `streams` | Streams the logger is responsible for, with their JSON schema |
//! | `logger_config` | Exactly one row of connection and scheduling settings |
//!
//! All operations are synchronous. Callers that share a `Database` between
//! threads wrap it in their own mutex; the connection itself is not `Sync`.

mod db;
mod error;
mod migrations;
mod models;

pub use db::Database;
pub use error::{DatabaseError, DatabaseResult};
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use models::*;
