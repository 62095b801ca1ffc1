//! Snapshot artifacts and run statistics
//!
//! This module owns the JSON artifacts written into each snapshot tree
//! (`manifest.json`, `skipped_assets.json`) and the aggregate statistics
//! shown by the `--stats` mode.

mod manifest;
mod stats;

pub use manifest::{
    load_manifest, load_skipped_report, write_manifest, write_skipped_report, Manifest,
    ManifestAssets, SkipReason, SkippedAsset, SkippedReport,
};
pub use stats::{load_statistics, print_statistics, RunStatistics};
