//! Wayback-Archiver: a polite Wayback Machine snapshot archiver
//!
//! This crate implements a resumable crawler that materializes historical
//! captures of web domains as self-contained, browsable snapshot trees,
//! deduplicating assets by URL and by content hash.

pub mod archive;
pub mod assets;
pub mod config;
pub mod crawler;
pub mod output;
pub mod rewrite;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for archiver operations
#[derive(Debug, Error)]
pub enum ArchiverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTML rewrite error: {0}")]
    Rewrite(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted by shutdown signal")]
    Interrupted,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required credential: {0}")]
    MissingAuth(String),
}

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, ArchiverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{ArchiveAuth, Config};
pub use storage::{AssetStore, QueueStatus, WorkQueue};
pub use crate::url::{derive_domain, is_internal_host};
