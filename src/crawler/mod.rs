//! Crawler module
//!
//! This module contains the crawl engine proper:
//! - the asset fetcher (size gate, pacing, rate-limit back-off, dedup)
//! - the off-peak scheduler gate
//! - the page processor (one queue unit end-to-end)
//! - the supervisor owning the main loop

mod fetcher;
mod processor;
mod scheduler;
mod supervisor;

pub use fetcher::{AssetError, AssetFetcher, DedupStats, FetchOutcome, FetchReport, FetchedAsset};
pub use processor::{page_local_path, PageOutcome, PageProcessor};
pub use scheduler::OffPeakWindow;
pub use supervisor::{load_selections, parse_selections, run_crawl, RunFlags, Selection};
