//! Work-queue persistence
//!
//! The queue is the single source of truth for crawl progress. It is
//! process-local and file-backed; reopening it after a crash surfaces all
//! pending items exactly as they were left.

use crate::storage::schema::initialize_queue_schema;
use crate::storage::{QueueItem, QueueStatus, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable set of `(url, timestamp)` work units
pub struct WorkQueue {
    conn: Connection,
}

/// Counts of queue rows by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.completed + self.failed
    }
}

impl WorkQueue {
    /// Opens (or creates) the queue database at the given path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(WorkQueue)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_queue_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory queue (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_queue_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Adds a unit of work if it does not already exist
    ///
    /// Insertion is idempotent: re-adding an existing `(url, timestamp)` key
    /// is a no-op and preserves the row's status.
    pub fn add(&mut self, url: &str, timestamp: &str, domain: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO urls (url, timestamp, domain, status, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                url,
                timestamp,
                domain,
                QueueStatus::Pending.to_db_string(),
                now
            ],
        )?;
        Ok(())
    }

    /// Returns the next pending unit, in insertion order
    ///
    /// Selection order is deterministic within a process so tests can pin it.
    pub fn next(&self) -> StorageResult<Option<QueueItem>> {
        let item = self
            .conn
            .query_row(
                "SELECT url, timestamp, domain, status, local_path, error, discovered_at, fetched_at
                 FROM urls WHERE status = 'pending' ORDER BY rowid LIMIT 1",
                [],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Gets a specific unit by key
    pub fn get(&self, url: &str, timestamp: &str) -> StorageResult<Option<QueueItem>> {
        let item = self
            .conn
            .query_row(
                "SELECT url, timestamp, domain, status, local_path, error, discovered_at, fetched_at
                 FROM urls WHERE url = ?1 AND timestamp = ?2",
                params![url, timestamp],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Marks a unit as successfully completed
    pub fn mark_completed(
        &mut self,
        url: &str,
        timestamp: &str,
        local_path: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE urls SET status = 'completed', local_path = ?1, fetched_at = ?2
             WHERE url = ?3 AND timestamp = ?4",
            params![local_path, now, url, timestamp],
        )?;
        Ok(())
    }

    /// Marks a unit as failed with an error description
    pub fn mark_failed(&mut self, url: &str, timestamp: &str, error: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE urls SET status = 'failed', error = ?1, fetched_at = ?2
             WHERE url = ?3 AND timestamp = ?4",
            params![error, now, url, timestamp],
        )?;
        Ok(())
    }

    /// Counts rows by status
    pub fn stats(&self) -> StorageResult<QueueStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM urls GROUP BY status")?;

        let mut stats = QueueStats::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            match QueueStatus::from_db_string(&status) {
                Some(QueueStatus::Pending) => stats.pending = count as u64,
                Some(QueueStatus::Completed) => stats.completed = count as u64,
                Some(QueueStatus::Failed) => stats.failed = count as u64,
                None => {}
            }
        }

        Ok(stats)
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        url: row.get(0)?,
        timestamp: row.get(1)?,
        domain: row.get(2)?,
        status: QueueStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(QueueStatus::Failed),
        local_path: row.get(4)?,
        error: row.get(5)?,
        discovered_at: row.get(6)?,
        fetched_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_next() {
        let mut queue = WorkQueue::open_in_memory().unwrap();
        queue
            .add("http://example.com/", "19991005123456", "example.com")
            .unwrap();

        let item = queue.next().unwrap().unwrap();
        assert_eq!(item.url, "http://example.com/");
        assert_eq!(item.timestamp, "19991005123456");
        assert_eq!(item.domain, "example.com");
        assert_eq!(item.status, QueueStatus::Pending);
        assert!(item.local_path.is_none());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut queue = WorkQueue::open_in_memory().unwrap();
        for _ in 0..3 {
            queue
                .add("http://example.com/", "19991005123456", "example.com")
                .unwrap();
        }

        let stats = queue.stats().unwrap();
        assert_eq!(stats.total(), 1);
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn test_add_preserves_existing_status() {
        let mut queue = WorkQueue::open_in_memory().unwrap();
        queue
            .add("http://example.com/", "19991005123456", "example.com")
            .unwrap();
        queue
            .mark_completed("http://example.com/", "19991005123456", "example.com/19991005123456/index.html")
            .unwrap();

        // Re-adding the completed key must not reopen it
        queue
            .add("http://example.com/", "19991005123456", "example.com")
            .unwrap();

        let item = queue.get("http://example.com/", "19991005123456").unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Completed);
    }

    #[test]
    fn test_same_url_different_timestamp_is_distinct() {
        let mut queue = WorkQueue::open_in_memory().unwrap();
        queue
            .add("http://example.com/", "19991005123456", "example.com")
            .unwrap();
        queue
            .add("http://example.com/", "20030115000000", "example.com")
            .unwrap();

        assert_eq!(queue.stats().unwrap().total(), 2);
    }

    #[test]
    fn test_next_follows_insertion_order() {
        let mut queue = WorkQueue::open_in_memory().unwrap();
        queue.add("http://example.com/a", "19991005123456", "example.com").unwrap();
        queue.add("http://example.com/b", "19991005123456", "example.com").unwrap();

        let first = queue.next().unwrap().unwrap();
        assert_eq!(first.url, "http://example.com/a");

        queue
            .mark_completed(&first.url, &first.timestamp, "a/index.html")
            .unwrap();

        let second = queue.next().unwrap().unwrap();
        assert_eq!(second.url, "http://example.com/b");
    }

    #[test]
    fn test_mark_completed() {
        let mut queue = WorkQueue::open_in_memory().unwrap();
        queue.add("http://example.com/", "19991005123456", "example.com").unwrap();
        queue
            .mark_completed("http://example.com/", "19991005123456", "example.com/19991005123456/index.html")
            .unwrap();

        let item = queue.get("http://example.com/", "19991005123456").unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Completed);
        assert_eq!(
            item.local_path.as_deref(),
            Some("example.com/19991005123456/index.html")
        );
        assert!(item.fetched_at.is_some());
        assert!(queue.next().unwrap().is_none());
    }

    #[test]
    fn test_mark_failed() {
        let mut queue = WorkQueue::open_in_memory().unwrap();
        queue.add("http://example.com/", "19991005123456", "example.com").unwrap();
        queue
            .mark_failed("http://example.com/", "19991005123456", "HTTP 503")
            .unwrap();

        let item = queue.get("http://example.com/", "19991005123456").unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.error.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn test_stats_by_status() {
        let mut queue = WorkQueue::open_in_memory().unwrap();
        queue.add("http://example.com/a", "19991005123456", "example.com").unwrap();
        queue.add("http://example.com/b", "19991005123456", "example.com").unwrap();
        queue.add("http://example.com/c", "19991005123456", "example.com").unwrap();

        queue.mark_completed("http://example.com/a", "19991005123456", "a").unwrap();
        queue.mark_failed("http://example.com/b", "19991005123456", "boom").unwrap();

        let stats = queue.stats().unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_reopen_surfaces_pending_items() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("queue.db");

        {
            let mut queue = WorkQueue::open(&db_path).unwrap();
            queue.add("http://example.com/a", "19991005123456", "example.com").unwrap();
            queue.add("http://example.com/b", "19991005123456", "example.com").unwrap();
            queue.mark_completed("http://example.com/a", "19991005123456", "a").unwrap();
        }

        let queue = WorkQueue::open(&db_path).unwrap();
        let stats = queue.stats().unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);

        let next = queue.next().unwrap().unwrap();
        assert_eq!(next.url, "http://example.com/b");
    }
}
