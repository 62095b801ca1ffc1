//! Page processing
//!
//! Drives one queue unit end-to-end: gate on the scheduler, fetch the
//! archived page, fetch its assets, rewrite references for local browsing,
//! persist the manifest, finalize the queue row, and enqueue same-timestamp
//! links discovered in the original body.

use crate::archive::{CaptureClient, CaptureError};
use crate::assets::{extract_css_assets, extract_html_assets, extract_page_links, AssetType};
use crate::config::CrawlerConfig;
use crate::crawler::fetcher::AssetFetcher;
use crate::crawler::scheduler::OffPeakWindow;
use crate::output::{
    load_manifest, load_skipped_report, write_manifest, write_skipped_report, Manifest,
    SkippedReport,
};
use crate::rewrite::{rewrite_css, rewrite_html};
use crate::storage::{AssetStore, QueueItem, WorkQueue};
use crate::Result;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use url::Url;

/// Summary of one processed page, for progress logging
#[derive(Debug)]
pub struct PageOutcome {
    pub local_path: String,
    pub assets_fetched: usize,
    pub assets_skipped: usize,
    pub asset_errors: usize,
    pub links_discovered: usize,
}

/// Processes one queue unit at a time
///
/// Borrows the process-wide state owned by the supervisor; there are no
/// module-level globals.
pub struct PageProcessor<'a> {
    pub client: &'a CaptureClient,
    pub queue: &'a mut WorkQueue,
    pub store: &'a mut AssetStore,
    pub window: &'a OffPeakWindow,
    pub crawler: &'a CrawlerConfig,
    pub output_dir: &'a Path,
    pub asset_delay: Duration,
    pub shutdown: &'a AtomicBool,
}

impl PageProcessor<'_> {
    /// Processes one unit
    ///
    /// Page-level failures mark the queue row `failed` and return
    /// `Ok(None)`; only infrastructure errors and shutdown interrupts
    /// propagate as `Err`.
    pub async fn process(&mut self, item: &QueueItem) -> Result<Option<PageOutcome>> {
        self.window.wait_if_needed().await;

        let body = match self.fetch_page(&item.url, &item.timestamp).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!("Page fetch failed for {}: {}", item.url, err);
                self.queue.mark_failed(&item.url, &item.timestamp, &err.to_string())?;
                return Ok(None);
            }
        };

        let base = match Url::parse(&item.url) {
            Ok(base) => base,
            Err(err) => {
                self.queue
                    .mark_failed(&item.url, &item.timestamp, &format!("bad URL: {}", err))?;
                return Ok(None);
            }
        };

        // Non-HTML bodies pass through extraction and rewriting as no-ops
        // and are still saved.
        let mut assets = extract_html_assets(&body, &base, &item.domain);
        if !self.crawler.fetch_external_assets {
            assets.retain(|asset| !asset.is_external);
        }
        tracing::info!("Found {} assets on {}", assets.len(), item.url);

        let snapshot_dir = self.output_dir.join(&item.domain).join(&item.timestamp);

        let mut fetcher = AssetFetcher::new(
            self.client,
            self.store,
            self.asset_delay,
            self.crawler.max_asset_size_mb,
            self.shutdown,
        );
        let report = fetcher
            .fetch_all(&assets, &item.domain, &item.timestamp, &snapshot_dir)
            .await?;

        // Stylesheets may pull in fonts and images of their own; fetch one
        // nested level in the same pass.
        let css_paths: Vec<_> = report
            .fetched
            .iter()
            .filter(|fetched| fetched.kind == AssetType::Css)
            .map(|fetched| (fetched.original_url.clone(), fetched.local_path.clone()))
            .collect();

        let mut report = report;
        for (css_url, css_path) in &css_paths {
            let Ok(css_text) = std::fs::read_to_string(css_path) else {
                continue;
            };
            let Ok(css_base) = Url::parse(css_url) else {
                continue;
            };
            let mut nested = extract_css_assets(&css_text, &css_base, &item.domain);
            if !self.crawler.fetch_external_assets {
                nested.retain(|asset| !asset.is_external);
            }
            // Anything already materialized dedups via the store
            let nested_report = fetcher
                .fetch_all(&nested, &item.domain, &item.timestamp, &snapshot_dir)
                .await?;
            report.merge(nested_report);
        }
        drop(fetcher);

        let skipped_total = self.write_skipped(&snapshot_dir, item, &report)?;

        let rewritten = rewrite_html(&body, &base, &item.domain)?;

        // Rewrite fetched stylesheets in place. The write replaces the
        // file rather than updating it through the link, so the canonical
        // store copy keeps the downloaded bytes.
        for (css_url, css_path) in &css_paths {
            let Ok(css_text) = std::fs::read_to_string(css_path) else {
                continue;
            };
            let Ok(css_base) = Url::parse(css_url) else {
                continue;
            };
            let rewritten_css = rewrite_css(&css_text, &css_base, &item.domain);
            if rewritten_css != css_text {
                std::fs::remove_file(css_path)?;
                std::fs::write(css_path, rewritten_css)?;
            }
        }

        let local = page_local_path(&base);
        let page_path = snapshot_dir.join(&local);
        if let Some(parent) = page_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&page_path, &rewritten)?;
        tracing::info!("Saved page to {}", page_path.display());

        self.update_manifest(&snapshot_dir, item, &local, &report, skipped_total)?;

        let stored_path = format!("{}/{}/{}", item.domain, item.timestamp, local);
        self.queue
            .mark_completed(&item.url, &item.timestamp, &stored_path)?;

        // Discovery uses the original body: rewritten references no longer
        // resolve to archive URLs.
        let links = extract_page_links(&body, &base, &item.domain);
        for link in &links {
            self.queue.add(link, &item.timestamp, &item.domain)?;
        }

        Ok(Some(PageOutcome {
            local_path: stored_path,
            assets_fetched: report.fetched.len(),
            assets_skipped: report.skipped.len(),
            asset_errors: report.errors.len(),
            links_discovered: links.len(),
        }))
    }

    /// Fetches the page body, absorbing one rate-limit pause
    async fn fetch_page(
        &self,
        url: &str,
        timestamp: &str,
    ) -> std::result::Result<String, CaptureError> {
        match self.client.get_page(url, timestamp).await {
            Err(CaptureError::RateLimited { retry_after }) => {
                tracing::warn!(
                    "Rate limited on page fetch; pausing {} seconds",
                    retry_after
                );
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                self.client.get_page(url, timestamp).await.map(|page| page.body)
            }
            other => other.map(|page| page.body),
        }
    }

    /// Merges this page's skipped assets into the snapshot's report file
    ///
    /// Returns the total skipped count for the manifest.
    fn write_skipped(
        &self,
        snapshot_dir: &Path,
        item: &QueueItem,
        report: &crate::crawler::fetcher::FetchReport,
    ) -> Result<u64> {
        let mut skipped = load_skipped_report(snapshot_dir)?
            .map(|existing| existing.skipped)
            .unwrap_or_default();

        for entry in &report.skipped {
            if !skipped.iter().any(|s| s.archive_url == entry.archive_url) {
                skipped.push(entry.clone());
            }
        }

        let total = skipped.len() as u64;
        if !skipped.is_empty() {
            write_skipped_report(
                snapshot_dir,
                &SkippedReport {
                    domain: item.domain.clone(),
                    timestamp: item.timestamp.clone(),
                    skipped,
                },
            )?;
        }
        Ok(total)
    }

    /// Rewrites the snapshot manifest to reflect totals after this page
    fn update_manifest(
        &self,
        snapshot_dir: &Path,
        item: &QueueItem,
        local: &str,
        report: &crate::crawler::fetcher::FetchReport,
        skipped_total: u64,
    ) -> Result<()> {
        let mut manifest = load_manifest(snapshot_dir)?
            .unwrap_or_else(|| Manifest::new(&item.domain, &item.timestamp));

        manifest.record_page(local);
        for fetched in &report.fetched {
            manifest.record_asset(
                fetched.kind.as_str(),
                fetched.size_bytes,
                fetched.external_host.as_deref(),
            );
        }
        manifest.skipped_count = skipped_total;

        write_manifest(snapshot_dir, &manifest)?;
        Ok(())
    }
}

/// Computes the page's path inside the snapshot tree
///
/// The leading slash of the URL path is stripped; an empty path becomes
/// `index.html`, and any path not ending in `.html`/`.htm` gets
/// `/index.html` appended so it can anchor sibling pages as a directory.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use wayback_archiver::crawler::page_local_path;
///
/// let root = Url::parse("http://example.com/").unwrap();
/// assert_eq!(page_local_path(&root), "index.html");
///
/// let section = Url::parse("http://example.com/about").unwrap();
/// assert_eq!(page_local_path(&section), "about/index.html");
///
/// let page = Url::parse("http://example.com/news/today.html").unwrap();
/// assert_eq!(page_local_path(&page), "news/today.html");
/// ```
pub fn page_local_path(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return "index.html".to_string();
    }
    if path.ends_with(".html") || path.ends_with(".htm") {
        path.to_string()
    } else {
        format!("{}/index.html", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_local_path_root() {
        let url = Url::parse("http://example.com/").unwrap();
        assert_eq!(page_local_path(&url), "index.html");
    }

    #[test]
    fn test_page_local_path_html_file() {
        let url = Url::parse("http://example.com/news/today.html").unwrap();
        assert_eq!(page_local_path(&url), "news/today.html");
    }

    #[test]
    fn test_page_local_path_htm_file() {
        let url = Url::parse("http://example.com/old.htm").unwrap();
        assert_eq!(page_local_path(&url), "old.htm");
    }

    #[test]
    fn test_page_local_path_directory() {
        let url = Url::parse("http://example.com/about").unwrap();
        assert_eq!(page_local_path(&url), "about/index.html");
    }

    #[test]
    fn test_page_local_path_trailing_slash() {
        let url = Url::parse("http://example.com/about/").unwrap();
        assert_eq!(page_local_path(&url), "about/index.html");
    }

    #[test]
    fn test_page_local_path_ignores_query() {
        let url = Url::parse("http://example.com/page?id=3").unwrap();
        assert_eq!(page_local_path(&url), "page/index.html");
    }
}
