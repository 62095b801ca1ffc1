//! Crawl supervision
//!
//! Owns the main loop: loads selections into the queue, processes one unit
//! at a time with polite inter-page pacing, logs running statistics, and
//! shuts down cooperatively on interrupt.

use crate::archive::CaptureClient;
use crate::config::{ArchiveAuth, Config};
use crate::crawler::processor::PageProcessor;
use crate::crawler::scheduler::OffPeakWindow;
use crate::storage::{AssetStore, WorkQueue};
use crate::url::derive_domain;
use crate::{ArchiverError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Run-mode switches from the command line
///
/// The two knobs are deliberately distinct: `no_delay` is the "run it now"
/// switch that drops pacing *and* the off-peak gate, while
/// `ignore_schedule` bypasses only the gate and keeps polite pacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    pub no_delay: bool,
    pub ignore_schedule: bool,
}

/// One operator-chosen `(timestamp, url)` to materialize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub timestamp: String,
    pub url: String,
    pub domain: String,
}

/// Parses a selections file body
///
/// Each non-blank, non-`#` line is `TIMESTAMP|URL` with a 14-digit
/// timestamp and an absolute HTTP(S) URL. Malformed lines are skipped with
/// a warning; they never abort the load.
pub fn parse_selections(content: &str) -> Vec<Selection> {
    let mut selections = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_selection_line(line) {
            Some(selection) => selections.push(selection),
            None => {
                tracing::warn!("Skipping malformed selection on line {}: {}", number + 1, line);
            }
        }
    }

    selections
}

fn parse_selection_line(line: &str) -> Option<Selection> {
    let (timestamp, url) = line.split_once('|')?;
    let timestamp = timestamp.trim();
    let url = url.trim();

    if timestamp.len() != 14 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    let domain = derive_domain(&parsed)?;

    Some(Selection {
        timestamp: timestamp.to_string(),
        url: url.to_string(),
        domain,
    })
}

/// Loads a selections file
///
/// An unreadable file is a fatal startup error.
pub fn load_selections(path: &Path) -> Result<Vec<Selection>> {
    let content = std::fs::read_to_string(path)?;
    let selections = parse_selections(&content);
    tracing::info!(
        "Loaded {} selections from {}",
        selections.len(),
        path.display()
    );
    Ok(selections)
}

/// Runs the crawl to queue exhaustion or interrupt
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `auth` - Archive credentials
/// * `selections_path` - Path to the selections file
/// * `flags` - Run-mode switches
///
/// # Returns
///
/// * `Ok(())` - Queue exhausted or interrupted cleanly
/// * `Err(ArchiverError)` - Fatal failure (config, database open, IO)
pub async fn run_crawl(
    config: &Config,
    auth: &ArchiveAuth,
    selections_path: &Path,
    flags: RunFlags,
) -> Result<()> {
    let mut queue = WorkQueue::open(Path::new(&config.output.queue_db))?;
    let mut store = AssetStore::open(Path::new(&config.output.asset_db))?;

    let selections = load_selections(selections_path)?;
    for selection in &selections {
        queue.add(&selection.url, &selection.timestamp, &selection.domain)?;
    }

    let client = CaptureClient::new(&config.archive.host, auth)?;

    let bypass_gate = flags.no_delay || flags.ignore_schedule;
    let window = OffPeakWindow::from_config(&config.schedule, bypass_gate)?;
    if window.is_enabled() {
        tracing::info!(
            "Off-peak window: {} - {}",
            config.schedule.off_peak_start,
            config.schedule.off_peak_end
        );
    }

    let (page_delay, asset_delay) = if flags.no_delay {
        (Duration::ZERO, Duration::ZERO)
    } else {
        (
            Duration::from_secs(config.crawler.page_delay_seconds),
            Duration::from_millis(config.crawler.asset_delay_ms),
        )
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received; finishing the current unit");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let output_dir = Path::new(&config.output.output_dir);
    std::fs::create_dir_all(output_dir)?;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            tracing::info!("Shutting down on interrupt");
            break;
        }

        let Some(item) = queue.next()? else {
            tracing::info!("No more pending units");
            break;
        };

        tracing::info!("Processing [{}] {}", item.timestamp, item.url);

        let mut processor = PageProcessor {
            client: &client,
            queue: &mut queue,
            store: &mut store,
            window: &window,
            crawler: &config.crawler,
            output_dir,
            asset_delay,
            shutdown: &shutdown,
        };

        match processor.process(&item).await {
            Ok(Some(outcome)) => {
                tracing::info!(
                    "Completed {} ({} assets, {} skipped, {} errors, {} links discovered)",
                    outcome.local_path,
                    outcome.assets_fetched,
                    outcome.assets_skipped,
                    outcome.asset_errors,
                    outcome.links_discovered
                );
            }
            Ok(None) => {
                // Failure already recorded on the queue row
            }
            Err(ArchiverError::Interrupted) => {
                tracing::info!("Interrupted mid-page; unit stays pending for the next run");
                break;
            }
            Err(err) => {
                // One bad page must not abort the run
                tracing::error!("Page processing failed for {}: {}", item.url, err);
                queue.mark_failed(&item.url, &item.timestamp, &err.to_string())?;
            }
        }

        let stats = queue.stats()?;
        tracing::info!(
            "Queue: {} pending, {} completed, {} failed",
            stats.pending,
            stats.completed,
            stats.failed
        );

        if !page_delay.is_zero() && !shutdown.load(Ordering::SeqCst) {
            tracing::debug!("Sleeping {:?} before next page", page_delay);
            tokio::time::sleep(page_delay).await;
        }
    }

    let stats = queue.stats()?;
    let store_stats = store.stats()?;
    tracing::info!(
        "Final: {} completed, {} failed, {} pending; {} assets stored, {:.2} MB saved by reuse",
        stats.completed,
        stats.failed,
        stats.pending,
        store_stats.total_assets,
        store_stats.bytes_saved as f64 / (1024.0 * 1024.0)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_selections() {
        let content = "19991005123456|http://example.com/\n20030115000000|https://www.example.com/about\n";
        let selections = parse_selections(content);
        assert_eq!(selections.len(), 2);
        assert_eq!(selections[0].timestamp, "19991005123456");
        assert_eq!(selections[0].domain, "example.com");
        assert_eq!(selections[1].domain, "example.com");
    }

    #[test]
    fn test_parse_skips_blank_lines_and_comments() {
        let content = "\n# a comment\n19991005123456|http://example.com/\n\n   \n# more\n";
        let selections = parse_selections(content);
        assert_eq!(selections.len(), 1);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let content = "\
not a selection
1999|http://example.com/
19991005123456|ftp://example.com/
19991005123456|not a url
1999100512345X|http://example.com/
19991005123456|http://example.com/valid
";
        let selections = parse_selections(content);
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].url, "http://example.com/valid");
    }

    #[test]
    fn test_parse_derives_domain_without_www() {
        let content = "19991005123456|http://www.example.com/page";
        let selections = parse_selections(content);
        assert_eq!(selections[0].domain, "example.com");
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        let content = "  19991005123456 | http://example.com/  ";
        let selections = parse_selections(content);
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].url, "http://example.com/");
    }
}
