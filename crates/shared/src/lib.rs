//! Shared library for the anime stream aggregator.
//!
//! This crate provides common functionality used by the service crates:
//! - Configuration management
//! - Logging infrastructure
//! - SQLite database and the watch-history store

pub mod config;
pub mod db;
pub mod history;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use history::HistoryStore;
pub use logging::LogConfig;
pub use models::*;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
