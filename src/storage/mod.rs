//! Storage module for persistent crawl state
//!
//! Two embedded SQLite databases back the crawler:
//! - the work queue (`urls` table), the single source of truth for progress
//! - the asset store (`assets` table), the content-addressed index behind
//!   hard-linked snapshot trees

mod queue;
mod schema;
mod store;

pub use queue::{QueueStats, WorkQueue};
pub use store::{AssetStore, NewAsset, StoreStats};

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Status of a queued `(url, timestamp)` unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// Waiting to be processed
    Pending,
    /// Snapshot tree written and row finalized
    Completed,
    /// Page fetch failed; inspectable via the queue DB
    Failed,
}

impl QueueStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true if the status is terminal within a run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A work-queue row for one `(url, timestamp)` unit
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub url: String,
    pub timestamp: String,
    pub domain: String,
    pub status: QueueStatus,
    pub local_path: Option<String>,
    pub error: Option<String>,
    pub discovered_at: String,
    pub fetched_at: Option<String>,
}

/// An asset-store row describing one downloaded capture
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub id: i64,
    /// Full archive capture URL; unique per row
    pub wayback_url: String,
    pub original_url: String,
    /// SHA-256 of the bytes at `file_path` at save time
    pub content_hash: String,
    /// Canonical on-disk location; snapshot trees hard-link to it
    pub file_path: String,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub first_downloaded: String,
    /// Successful requests for this capture URL; first download counts as 1
    pub download_count: u32,
    pub domain: Option<String>,
    pub timestamp: Option<String>,
}

impl StoredAsset {
    /// Size of the stored bytes in megabytes
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            QueueStatus::Pending,
            QueueStatus::Completed,
            QueueStatus::Failed,
        ] {
            assert_eq!(
                QueueStatus::from_db_string(status.to_db_string()),
                Some(status)
            );
        }
        assert_eq!(QueueStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!QueueStatus::Pending.is_terminal());
        assert!(QueueStatus::Completed.is_terminal());
        assert!(QueueStatus::Failed.is_terminal());
    }

    #[test]
    fn test_size_mb() {
        let asset = StoredAsset {
            id: 1,
            wayback_url: "w".to_string(),
            original_url: "o".to_string(),
            content_hash: "h".to_string(),
            file_path: "f".to_string(),
            size_bytes: 524_288,
            mime_type: None,
            first_downloaded: String::new(),
            download_count: 1,
            domain: None,
            timestamp: None,
        };
        assert_eq!(asset.size_mb(), 0.5);
    }
}
