//! Content-addressed asset store
//!
//! The store keeps two indexes over downloaded assets: one by capture URL
//! (unique) and one by content hash. Snapshot trees receive hard links to
//! the canonical file, so identical bytes occupy disk space once no matter
//! how many captures reference them.

use crate::storage::schema::initialize_asset_schema;
use crate::storage::{StorageError, StorageResult, StoredAsset};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Content-addressed on-disk store with a SQLite index
pub struct AssetStore {
    conn: Connection,
}

/// Metadata for a freshly downloaded asset, before indexing
///
/// The caller has already streamed the bytes to `target_path` and computed
/// their hash during the write.
pub struct NewAsset<'a> {
    pub wayback_url: &'a str,
    pub original_url: &'a str,
    pub content_hash: &'a str,
    pub target_path: &'a Path,
    pub size_bytes: u64,
    pub mime_type: Option<&'a str>,
    pub domain: &'a str,
    pub timestamp: &'a str,
}

/// Aggregate store statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub total_assets: u64,
    pub total_bytes: u64,
    /// Bytes not re-downloaded thanks to URL-level reuse:
    /// sum of `size_bytes * (download_count - 1)`
    pub bytes_saved: u64,
}

impl AssetStore {
    /// Opens (or creates) the asset database at the given path
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_asset_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_asset_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Looks up an asset by its capture URL
    ///
    /// A hit entitles the caller to reuse the existing file instead of
    /// fetching again.
    pub fn lookup(&self, wayback_url: &str) -> StorageResult<Option<StoredAsset>> {
        let asset = self
            .conn
            .query_row(
                &format!("{} WHERE wayback_url = ?1", SELECT_ASSET),
                params![wayback_url],
                row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    /// Looks up an asset by content hash
    ///
    /// When multiple rows share a hash the first inserter wins; later
    /// identical bytes link to that canonical file.
    pub fn lookup_by_hash(&self, content_hash: &str) -> StorageResult<Option<StoredAsset>> {
        let asset = self
            .conn
            .query_row(
                &format!("{} WHERE content_hash = ?1 ORDER BY id LIMIT 1", SELECT_ASSET),
                params![content_hash],
                row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    /// Materializes an existing asset at a new snapshot-tree path
    ///
    /// Creates `target` as a hard link to the canonical file. Parent
    /// directories are created as needed; an already-present target is left
    /// alone. If hard-linking fails (cross-device, ACL) the bytes are
    /// copied instead and a warning is logged — the store still records the
    /// logical reuse.
    pub fn materialize(&self, existing: &StoredAsset, target: &Path) -> StorageResult<()> {
        if target.exists() {
            return Ok(());
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let canonical = Path::new(&existing.file_path);
        if let Err(err) = std::fs::hard_link(canonical, target) {
            tracing::warn!(
                "Hard link {} -> {} failed ({}), falling back to copy",
                existing.file_path,
                target.display(),
                err
            );
            std::fs::copy(canonical, target)?;
        }

        Ok(())
    }

    /// Indexes a freshly downloaded asset, deduplicating by content
    ///
    /// If the store already holds identical bytes under a different path,
    /// the just-written file is replaced by a hard link to the canonical
    /// copy and the new row points at the canonical path. Returns the
    /// persisted row and whether a content duplicate was detected.
    pub fn save_new(&mut self, new: NewAsset<'_>) -> StorageResult<(StoredAsset, bool)> {
        let target_str = new.target_path.to_string_lossy().to_string();

        let canonical = self.lookup_by_hash(new.content_hash)?;
        let (file_path, content_duplicate) = match canonical {
            Some(existing)
                if existing.file_path != target_str && Path::new(&existing.file_path).exists() =>
            {
                std::fs::remove_file(new.target_path)?;
                self.materialize(&existing, new.target_path)?;
                (existing.file_path, true)
            }
            _ => (target_str, false),
        };

        let now = Utc::now().to_rfc3339();
        // A row may already exist if a prior run crashed between the file
        // write and the commit; refresh it rather than failing the UNIQUE
        // constraint.
        self.conn.execute(
            "INSERT INTO assets
             (wayback_url, original_url, content_hash, file_path, size_bytes, mime_type,
              first_downloaded, download_count, domain, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)
             ON CONFLICT(wayback_url) DO UPDATE SET
                 content_hash = excluded.content_hash,
                 file_path = excluded.file_path,
                 size_bytes = excluded.size_bytes,
                 mime_type = excluded.mime_type,
                 download_count = download_count + 1",
            params![
                new.wayback_url,
                new.original_url,
                new.content_hash,
                file_path,
                new.size_bytes as i64,
                new.mime_type,
                now,
                new.domain,
                new.timestamp,
            ],
        )?;

        let asset = self
            .lookup(new.wayback_url)?
            .ok_or_else(|| StorageError::AssetNotFound(new.wayback_url.to_string()))?;

        Ok((asset, content_duplicate))
    }

    /// Records another successful request for a capture URL
    pub fn increment_use(&mut self, wayback_url: &str) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE assets SET download_count = download_count + 1 WHERE wayback_url = ?1",
            params![wayback_url],
        )?;
        if updated == 0 {
            return Err(StorageError::AssetNotFound(wayback_url.to_string()));
        }
        Ok(())
    }

    /// Aggregate totals and bytes saved through URL-level reuse
    pub fn stats(&self) -> StorageResult<StoreStats> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(size_bytes), 0),
                    COALESCE(SUM(size_bytes * (download_count - 1)), 0)
             FROM assets",
            [],
            |row| {
                Ok(StoreStats {
                    total_assets: row.get::<_, i64>(0)? as u64,
                    total_bytes: row.get::<_, i64>(1)? as u64,
                    bytes_saved: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;
        Ok(stats)
    }
}

const SELECT_ASSET: &str = "SELECT id, wayback_url, original_url, content_hash, file_path,
        size_bytes, mime_type, first_downloaded, download_count, domain, timestamp FROM assets";

fn row_to_asset(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredAsset> {
    Ok(StoredAsset {
        id: row.get(0)?,
        wayback_url: row.get(1)?,
        original_url: row.get(2)?,
        content_hash: row.get(3)?,
        file_path: row.get(4)?,
        size_bytes: row.get::<_, i64>(5)? as u64,
        mime_type: row.get(6)?,
        first_downloaded: row.get(7)?,
        download_count: row.get::<_, i64>(8)? as u32,
        domain: row.get(9)?,
        timestamp: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    fn hash_of(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    fn write_target(dir: &TempDir, rel: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn save(
        store: &mut AssetStore,
        dir: &TempDir,
        wayback_url: &str,
        rel: &str,
        bytes: &[u8],
    ) -> (StoredAsset, bool) {
        let path = write_target(dir, rel, bytes);
        store
            .save_new(NewAsset {
                wayback_url,
                original_url: "http://example.com/x",
                content_hash: &hash_of(bytes),
                target_path: &path,
                size_bytes: bytes.len() as u64,
                mime_type: Some("image/gif"),
                domain: "example.com",
                timestamp: "19991005123456",
            })
            .unwrap()
    }

    #[test]
    fn test_save_and_lookup() {
        let dir = TempDir::new().unwrap();
        let mut store = AssetStore::open_in_memory().unwrap();

        let (asset, duplicate) = save(&mut store, &dir, "https://a/web/1999/logo", "a/logo.gif", b"GIF89a");
        assert!(!duplicate);
        assert_eq!(asset.download_count, 1);
        assert_eq!(asset.size_bytes, 6);

        let found = store.lookup("https://a/web/1999/logo").unwrap().unwrap();
        assert_eq!(found.content_hash, hash_of(b"GIF89a"));
        assert!(store.lookup("https://a/web/1999/other").unwrap().is_none());
    }

    #[test]
    fn test_content_duplicate_links_to_canonical() {
        let dir = TempDir::new().unwrap();
        let mut store = AssetStore::open_in_memory().unwrap();

        let (first, _) = save(&mut store, &dir, "https://a/web/1999/a.png", "x/a.png", b"same-bytes");
        let (second, duplicate) = save(&mut store, &dir, "https://a/web/1999/b.png", "x/b.png", b"same-bytes");

        assert!(duplicate);
        // The second row points at the first file; both paths exist on disk.
        assert_eq!(second.file_path, first.file_path);
        assert!(dir.path().join("x/a.png").exists());
        assert!(dir.path().join("x/b.png").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let a = std::fs::metadata(dir.path().join("x/a.png")).unwrap();
            let b = std::fs::metadata(dir.path().join("x/b.png")).unwrap();
            assert_eq!(a.ino(), b.ino());
        }
    }

    #[test]
    fn test_distinct_content_keeps_own_path() {
        let dir = TempDir::new().unwrap();
        let mut store = AssetStore::open_in_memory().unwrap();

        let (first, _) = save(&mut store, &dir, "https://a/web/1999/a.png", "x/a.png", b"aaa");
        let (second, duplicate) = save(&mut store, &dir, "https://a/web/1999/b.png", "x/b.png", b"bbb");

        assert!(!duplicate);
        assert_ne!(first.file_path, second.file_path);
    }

    #[test]
    fn test_materialize_creates_hard_link() {
        let dir = TempDir::new().unwrap();
        let mut store = AssetStore::open_in_memory().unwrap();

        let (asset, _) = save(&mut store, &dir, "https://a/web/1999/logo", "store/logo.gif", b"GIF89a");

        let target = dir.path().join("snapshot/assets/logo.gif");
        store.materialize(&asset, &target).unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"GIF89a");

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let canonical = std::fs::metadata(dir.path().join("store/logo.gif")).unwrap();
            let linked = std::fs::metadata(&target).unwrap();
            assert_eq!(canonical.ino(), linked.ino());
        }
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = AssetStore::open_in_memory().unwrap();

        let (asset, _) = save(&mut store, &dir, "https://a/web/1999/logo", "store/logo.gif", b"GIF89a");
        let target = dir.path().join("snapshot/assets/logo.gif");

        store.materialize(&asset, &target).unwrap();
        store.materialize(&asset, &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"GIF89a");
    }

    #[test]
    fn test_increment_use() {
        let dir = TempDir::new().unwrap();
        let mut store = AssetStore::open_in_memory().unwrap();

        save(&mut store, &dir, "https://a/web/1999/logo", "store/logo.gif", b"GIF89a");
        store.increment_use("https://a/web/1999/logo").unwrap();

        let asset = store.lookup("https://a/web/1999/logo").unwrap().unwrap();
        assert_eq!(asset.download_count, 2);
    }

    #[test]
    fn test_increment_use_unknown_url_errors() {
        let mut store = AssetStore::open_in_memory().unwrap();
        assert!(store.increment_use("https://a/web/1999/missing").is_err());
    }

    #[test]
    fn test_stats_bytes_saved() {
        let dir = TempDir::new().unwrap();
        let mut store = AssetStore::open_in_memory().unwrap();

        save(&mut store, &dir, "https://a/web/1999/logo", "store/logo.gif", b"123456789\n");
        store.increment_use("https://a/web/1999/logo").unwrap();
        store.increment_use("https://a/web/1999/logo").unwrap();
        save(&mut store, &dir, "https://a/web/1999/one", "store/one.gif", b"abc");

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_assets, 2);
        assert_eq!(stats.total_bytes, 13);
        // 10 bytes downloaded once, reused twice
        assert_eq!(stats.bytes_saved, 20);
    }

    #[test]
    fn test_save_after_crash_refreshes_row() {
        let dir = TempDir::new().unwrap();
        let mut store = AssetStore::open_in_memory().unwrap();

        save(&mut store, &dir, "https://a/web/1999/logo", "store/logo.gif", b"old");
        // Same capture URL re-downloaded with different bytes
        let (asset, _) = save(&mut store, &dir, "https://a/web/1999/logo", "store/logo2.gif", b"newer");

        assert_eq!(asset.content_hash, hash_of(b"newer"));
        assert_eq!(asset.size_bytes, 5);
        assert_eq!(store.stats().unwrap().total_assets, 1);
    }
}
