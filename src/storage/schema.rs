//! Database schema definitions
//!
//! This module contains the SQL schema for both crawler databases.

/// SQL schema for the work-queue database
pub const QUEUE_SCHEMA_SQL: &str = r#"
-- One row per (url, timestamp) unit of work
CREATE TABLE IF NOT EXISTS urls (
    url TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    domain TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    local_path TEXT,
    discovered_at TEXT NOT NULL,
    fetched_at TEXT,
    error TEXT,
    PRIMARY KEY (url, timestamp)
);

CREATE INDEX IF NOT EXISTS idx_urls_status ON urls(status);
CREATE INDEX IF NOT EXISTS idx_urls_domain ON urls(domain);
"#;

/// SQL schema for the asset-store database
pub const ASSET_SCHEMA_SQL: &str = r#"
-- One row per successfully downloaded capture URL
CREATE TABLE IF NOT EXISTS assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wayback_url TEXT NOT NULL UNIQUE,
    original_url TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    file_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    mime_type TEXT,
    first_downloaded TEXT NOT NULL,
    download_count INTEGER NOT NULL DEFAULT 1,
    domain TEXT,
    timestamp TEXT
);

CREATE INDEX IF NOT EXISTS idx_assets_wayback_url ON assets(wayback_url);
CREATE INDEX IF NOT EXISTS idx_assets_content_hash ON assets(content_hash);
CREATE INDEX IF NOT EXISTS idx_assets_original_url ON assets(original_url);
"#;

/// Initializes the work-queue schema
pub fn initialize_queue_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(QUEUE_SCHEMA_SQL)?;
    Ok(())
}

/// Initializes the asset-store schema
pub fn initialize_asset_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(ASSET_SCHEMA_SQL)?;
    Ok(())
}
