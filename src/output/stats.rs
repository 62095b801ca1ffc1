//! Run statistics
//!
//! Aggregates queue and store counters for the `--stats` mode and the
//! periodic progress lines the supervisor logs.

use crate::storage::{AssetStore, QueueStats, StoreStats, WorkQueue};
use crate::Result;

/// Combined crawl statistics
#[derive(Debug, Clone, Copy)]
pub struct RunStatistics {
    pub queue: QueueStats,
    pub store: StoreStats,
}

/// Loads statistics from both databases
///
/// # Arguments
///
/// * `queue` - The work queue
/// * `store` - The asset store
pub fn load_statistics(queue: &WorkQueue, store: &AssetStore) -> Result<RunStatistics> {
    Ok(RunStatistics {
        queue: queue.stats()?,
        store: store.stats()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Queue:");
    println!("  Total units: {}", stats.queue.total());
    println!("  Pending: {}", stats.queue.pending);
    println!("  Completed: {}", stats.queue.completed);
    println!("  Failed: {}", stats.queue.failed);
    println!();

    println!("Asset store:");
    println!("  Stored assets: {}", stats.store.total_assets);
    println!(
        "  Stored bytes: {:.2} MB",
        stats.store.total_bytes as f64 / (1024.0 * 1024.0)
    );
    println!(
        "  Bandwidth saved by reuse: {:.2} MB",
        stats.store.bytes_saved as f64 / (1024.0 * 1024.0)
    );
    println!();

    let total = stats.queue.total();
    let completion = if total > 0 {
        (stats.queue.completed as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Progress: {:.1}% ({} / {} units completed)",
        completion, stats.queue.completed, total
    );
}
