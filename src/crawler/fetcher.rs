//! Asset fetching
//!
//! Materializes a page's asset set into the snapshot tree under the asset
//! store's discipline: URL-level cache hits reuse existing files via hard
//! links, oversized assets are skipped and recorded, downloads stream to
//! disk with the hash computed during the write, and a 429 pauses the whole
//! process before the asset is retried once.
//!
//! Assets are fetched sequentially with a fixed delay between downloads.
//! Politeness toward the upstream and deterministic resumability matter
//! more here than throughput; a 429 burst from parallel fetches would stall
//! the crawl for longer than the serial path takes.

use crate::archive::{CaptureClient, CaptureError};
use crate::assets::{snapshot_relative_path, AssetRef, AssetType};
use crate::output::{SkipReason, SkippedAsset};
use crate::storage::{AssetStore, NewAsset, StoredAsset};
use crate::url::capture_url;
use crate::{ArchiverError, Result};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One asset materialized into the snapshot tree
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub original_url: String,
    pub kind: AssetType,
    /// Absolute path of the file inside the snapshot tree
    pub local_path: PathBuf,
    /// Path relative to the snapshot root (what the rewriter emits)
    pub rel_path: String,
    pub size_bytes: u64,
    /// Host recorded in the manifest's external-domain list, if third-party
    pub external_host: Option<String>,
}

/// A per-asset error surfaced in the fetch report
#[derive(Debug, Clone)]
pub struct AssetError {
    pub url: String,
    pub error: String,
}

/// Deduplication counters for one page's fetch
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupStats {
    pub cache_hits: u64,
    pub content_duplicates: u64,
    pub bandwidth_saved_mb: f64,
}

/// Outcome of fetching a single asset
#[derive(Debug)]
pub enum FetchOutcome {
    /// Downloaded and stored as new content
    Fetched(FetchedAsset),
    /// Reused an existing capture without touching the network
    CacheHit { asset: FetchedAsset, saved_mb: f64 },
    /// Downloaded, but identical bytes were already on disk
    ContentDuplicate(FetchedAsset),
    /// Not materialized; recorded for manual recovery
    Skipped(SkippedAsset),
    /// Failed; recorded in the report's error list
    Error(AssetError),
}

/// Aggregate result of fetching one page's asset set
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Everything materialized in the tree, including cache hits and
    /// content duplicates
    pub fetched: Vec<FetchedAsset>,
    pub skipped: Vec<SkippedAsset>,
    pub errors: Vec<AssetError>,
    pub dedup: DedupStats,
}

impl FetchReport {
    /// Folds another report into this one (used for nested CSS assets)
    pub fn merge(&mut self, other: FetchReport) {
        self.fetched.extend(other.fetched);
        self.skipped.extend(other.skipped);
        self.errors.extend(other.errors);
        self.dedup.cache_hits += other.dedup.cache_hits;
        self.dedup.content_duplicates += other.dedup.content_duplicates;
        self.dedup.bandwidth_saved_mb += other.dedup.bandwidth_saved_mb;
    }
}

/// Sequential, politely-paced asset fetcher
pub struct AssetFetcher<'a> {
    client: &'a CaptureClient,
    store: &'a mut AssetStore,
    asset_delay: Duration,
    max_asset_size_mb: f64,
    shutdown: &'a AtomicBool,
    /// Whether a network request has been made yet (cache hits do not
    /// consume pacing)
    paced: bool,
}

impl<'a> AssetFetcher<'a> {
    pub fn new(
        client: &'a CaptureClient,
        store: &'a mut AssetStore,
        asset_delay: Duration,
        max_asset_size_mb: f64,
        shutdown: &'a AtomicBool,
    ) -> Self {
        Self {
            client,
            store,
            asset_delay,
            max_asset_size_mb,
            shutdown,
            paced: false,
        }
    }

    /// Fetches every asset in extraction order into the snapshot tree
    ///
    /// # Arguments
    ///
    /// * `assets` - Deduplicated references from extraction
    /// * `domain` - The snapshot domain
    /// * `timestamp` - The capture timestamp
    /// * `snapshot_dir` - Root of the snapshot tree on disk
    ///
    /// # Errors
    ///
    /// Returns `ArchiverError::Interrupted` when a shutdown was requested
    /// between assets; per-asset failures land in the report instead.
    pub async fn fetch_all(
        &mut self,
        assets: &[AssetRef],
        domain: &str,
        timestamp: &str,
        snapshot_dir: &Path,
    ) -> Result<FetchReport> {
        let mut report = FetchReport::default();

        for (index, asset) in assets.iter().enumerate() {
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(ArchiverError::Interrupted);
            }

            let outcome = self.fetch_one(asset, domain, timestamp, snapshot_dir).await?;
            match outcome {
                FetchOutcome::Fetched(fetched) => report.fetched.push(fetched),
                FetchOutcome::CacheHit { asset, saved_mb } => {
                    report.dedup.cache_hits += 1;
                    report.dedup.bandwidth_saved_mb += saved_mb;
                    report.fetched.push(asset);
                }
                FetchOutcome::ContentDuplicate(fetched) => {
                    report.dedup.content_duplicates += 1;
                    report.fetched.push(fetched);
                }
                FetchOutcome::Skipped(skipped) => report.skipped.push(skipped),
                FetchOutcome::Error(error) => {
                    tracing::warn!("Asset error for {}: {}", error.url, error.error);
                    report.errors.push(error);
                }
            }

            if (index + 1) % 10 == 0 {
                tracing::debug!("Assets: {}/{}", index + 1, assets.len());
            }
        }

        Ok(report)
    }

    /// Fetches one asset; only infrastructure failures (IO, database)
    /// propagate as `Err`
    async fn fetch_one(
        &mut self,
        asset: &AssetRef,
        domain: &str,
        timestamp: &str,
        snapshot_dir: &Path,
    ) -> Result<FetchOutcome> {
        let original = asset.url.as_str();
        let archive_url = capture_url(self.client.host(), timestamp, original);

        let rel_path = snapshot_relative_path(&asset.url, domain);
        let target = snapshot_dir.join(&rel_path);

        // Tier one: capture-URL identity
        if let Some(existing) = self.store.lookup(&archive_url)? {
            self.store.materialize(&existing, &target)?;
            self.store.increment_use(&archive_url)?;
            tracing::debug!("Cache hit: {}", archive_url);
            return Ok(FetchOutcome::CacheHit {
                saved_mb: existing.size_mb(),
                asset: self.fetched_asset(asset, &existing, target, rel_path),
            });
        }

        self.pace().await;

        let stream = match self.open_stream(original, timestamp).await {
            Ok(stream) => stream,
            Err(error) => return Ok(outcome_for_failure(asset, &archive_url, error)),
        };

        // Size gate on the declared length; the stream is dropped unread
        if let Some(length) = stream.content_length() {
            let size_mb = length as f64 / BYTES_PER_MB;
            if size_mb > self.max_asset_size_mb {
                tracing::info!(
                    "Skipping oversized asset ({:.1} MB > {:.1} MB): {}",
                    size_mb,
                    self.max_asset_size_mb,
                    original
                );
                return Ok(FetchOutcome::Skipped(SkippedAsset {
                    url: original.to_string(),
                    reason: SkipReason::SizeLimit,
                    size_mb: Some(size_mb),
                    archive_url,
                    error: None,
                }));
            }
        }

        let mime_type = stream.content_type();

        // Stream to disk, hashing as we write; the store row is committed
        // only after the stream completes, so a crash mid-write leaves an
        // orphan file the next run overwrites.
        let (content_hash, size_bytes) = match self.download(stream, &target).await {
            Ok(result) => result,
            Err(DownloadFailure::TooLarge { written_mb }) => {
                return Ok(FetchOutcome::Skipped(SkippedAsset {
                    url: original.to_string(),
                    reason: SkipReason::SizeLimit,
                    size_mb: Some(written_mb),
                    archive_url,
                    error: None,
                }));
            }
            Err(DownloadFailure::Stream(message)) => {
                return Ok(FetchOutcome::Error(AssetError {
                    url: original.to_string(),
                    error: message,
                }));
            }
            Err(DownloadFailure::Io(err)) => return Err(err.into()),
        };

        let (stored, content_duplicate) = self.store.save_new(NewAsset {
            wayback_url: &archive_url,
            original_url: original,
            content_hash: &content_hash,
            target_path: &target,
            size_bytes,
            mime_type: mime_type.as_deref(),
            domain,
            timestamp,
        })?;

        let fetched = self.fetched_asset(asset, &stored, target, rel_path);
        if content_duplicate {
            tracing::debug!("Content duplicate: {}", original);
            Ok(FetchOutcome::ContentDuplicate(fetched))
        } else {
            Ok(FetchOutcome::Fetched(fetched))
        }
    }

    /// Opens the raw capture stream, honoring one rate-limit pause
    ///
    /// A 429 pauses the whole process for the advertised interval, then the
    /// same asset is requested once more; a repeat 429 escalates to a
    /// permanent per-asset failure so the asset is never silently lost.
    async fn open_stream(
        &mut self,
        original: &str,
        timestamp: &str,
    ) -> std::result::Result<crate::archive::AssetStream, CaptureError> {
        match self.client.get_raw(original, timestamp).await {
            Err(CaptureError::RateLimited { retry_after }) => {
                tracing::warn!(
                    "Rate limited; pausing all work for {} seconds",
                    retry_after
                );
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                match self.client.get_raw(original, timestamp).await {
                    Err(CaptureError::RateLimited { .. }) => Err(CaptureError::Permanent {
                        status: 429,
                    }),
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Streams a response body to `target`, hashing during the write
    async fn download(
        &self,
        stream: crate::archive::AssetStream,
        target: &Path,
    ) -> std::result::Result<(String, u64), DownloadFailure> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(DownloadFailure::Io)?;
        }

        let mut file = tokio::fs::File::create(target)
            .await
            .map_err(DownloadFailure::Io)?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let limit_bytes = (self.max_asset_size_mb * BYTES_PER_MB) as u64;

        let mut body = stream.into_response().bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    drop(file);
                    let _ = std::fs::remove_file(target);
                    return Err(DownloadFailure::Stream(format!("stream failed: {}", err)));
                }
            };

            written += chunk.len() as u64;
            if written > limit_bytes {
                // No Content-Length header; the gate applies as we write
                drop(file);
                let _ = std::fs::remove_file(target);
                return Err(DownloadFailure::TooLarge {
                    written_mb: written as f64 / BYTES_PER_MB,
                });
            }

            hasher.update(&chunk);
            file.write_all(&chunk).await.map_err(DownloadFailure::Io)?;
        }

        file.flush().await.map_err(DownloadFailure::Io)?;
        Ok((hex::encode(hasher.finalize()), written))
    }

    /// Applies the inter-download delay; the first network request and all
    /// cache hits are unpaced
    async fn pace(&mut self) {
        if self.paced && !self.asset_delay.is_zero() {
            tokio::time::sleep(self.asset_delay).await;
        }
        self.paced = true;
    }

    fn fetched_asset(
        &self,
        asset: &AssetRef,
        stored: &StoredAsset,
        local_path: PathBuf,
        rel_path: String,
    ) -> FetchedAsset {
        FetchedAsset {
            original_url: asset.url.to_string(),
            kind: asset.kind,
            local_path,
            rel_path,
            size_bytes: stored.size_bytes,
            external_host: if asset.is_external {
                asset.url.host_str().map(|h| h.to_lowercase())
            } else {
                None
            },
        }
    }
}

/// Internal failure modes of the streaming download
enum DownloadFailure {
    TooLarge { written_mb: f64 },
    Stream(String),
    Io(std::io::Error),
}

/// Maps a classified capture failure onto a per-asset outcome
fn outcome_for_failure(
    asset: &AssetRef,
    archive_url: &str,
    error: CaptureError,
) -> FetchOutcome {
    let url = asset.url.to_string();
    match error {
        CaptureError::NotFound { status } => FetchOutcome::Skipped(SkippedAsset {
            url,
            reason: SkipReason::FetchError,
            size_mb: None,
            archive_url: archive_url.to_string(),
            error: Some(format!("HTTP {}", status)),
        }),
        CaptureError::RateLimited { .. } | CaptureError::Permanent { .. } => {
            FetchOutcome::Error(AssetError {
                url,
                error: error.to_string(),
            })
        }
        CaptureError::Transient(message) => FetchOutcome::Error(AssetError {
            url,
            error: message,
        }),
    }
}
