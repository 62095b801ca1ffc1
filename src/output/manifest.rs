//! Snapshot manifest and skipped-asset report
//!
//! Every snapshot tree carries a `manifest.json` describing what was
//! materialized, and — when assets were skipped — a `skipped_assets.json`
//! with enough detail for the operator to recover them manually.

use crate::ArchiverError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Manifest of one snapshot tree
///
/// Rewritten on every page save in the snapshot, so it stays consistent
/// with the files actually present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub domain: String,
    pub timestamp: String,
    /// ISO-8601 time of the most recent page save
    pub crawled_at: String,
    /// Snapshot-relative paths of rewritten pages
    pub pages: Vec<String>,
    pub assets: ManifestAssets,
    pub skipped_count: u64,
}

/// Asset totals inside a manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAssets {
    pub total: u64,
    pub by_type: BTreeMap<String, u64>,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    pub external_domains: Vec<String>,
}

/// Why an asset was not materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SizeLimit,
    FetchError,
    InvalidType,
}

/// One asset the crawler chose not to materialize
///
/// The archive URL is recorded so the operator can fetch it by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAsset {
    pub url: String,
    pub reason: SkipReason,
    #[serde(rename = "sizeMB", skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
    pub archive_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The `skipped_assets.json` document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedReport {
    pub domain: String,
    pub timestamp: String,
    pub skipped: Vec<SkippedAsset>,
}

impl Manifest {
    /// Creates an empty manifest for a snapshot
    pub fn new(domain: &str, timestamp: &str) -> Self {
        Self {
            domain: domain.to_string(),
            timestamp: timestamp.to_string(),
            crawled_at: chrono::Utc::now().to_rfc3339(),
            pages: Vec::new(),
            assets: ManifestAssets::default(),
            skipped_count: 0,
        }
    }

    /// Records a rewritten page, refreshing the crawl time
    pub fn record_page(&mut self, local_path: &str) {
        if !self.pages.iter().any(|p| p == local_path) {
            self.pages.push(local_path.to_string());
        }
        self.crawled_at = chrono::Utc::now().to_rfc3339();
    }

    /// Records one materialized asset
    pub fn record_asset(&mut self, kind: &str, size_bytes: u64, external_host: Option<&str>) {
        self.assets.total += 1;
        *self.assets.by_type.entry(kind.to_string()).or_insert(0) += 1;
        self.assets.total_size_mb += size_bytes as f64 / (1024.0 * 1024.0);

        if let Some(host) = external_host {
            if !self.assets.external_domains.iter().any(|d| d == host) {
                self.assets.external_domains.push(host.to_string());
            }
        }
    }
}

/// Loads the manifest of a snapshot directory, if one exists
pub fn load_manifest(snapshot_dir: &Path) -> Result<Option<Manifest>, ArchiverError> {
    let path = snapshot_dir.join("manifest.json");
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Writes (or rewrites) the manifest of a snapshot directory
pub fn write_manifest(snapshot_dir: &Path, manifest: &Manifest) -> Result<(), ArchiverError> {
    std::fs::create_dir_all(snapshot_dir)?;
    let path = snapshot_dir.join("manifest.json");
    let content = serde_json::to_string_pretty(manifest)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Loads the skipped-asset report of a snapshot directory, if one exists
pub fn load_skipped_report(snapshot_dir: &Path) -> Result<Option<SkippedReport>, ArchiverError> {
    let path = snapshot_dir.join("skipped_assets.json");
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Writes (or rewrites) the skipped-asset report
pub fn write_skipped_report(snapshot_dir: &Path, report: &SkippedReport) -> Result<(), ArchiverError> {
    std::fs::create_dir_all(snapshot_dir)?;
    let path = snapshot_dir.join("skipped_assets.json");
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)?;
    Ok(())
}
