//! Wayback-Archiver main entry point
//!
//! Command-line interface for the snapshot-acquisition engine.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wayback_archiver::config::{load_config, ArchiveAuth, Config};
use wayback_archiver::crawler::{run_crawl, RunFlags};
use wayback_archiver::output::{load_statistics, print_statistics};
use wayback_archiver::storage::{AssetStore, WorkQueue};

/// Wayback-Archiver: a polite Wayback Machine snapshot archiver
///
/// Given a selections file of `TIMESTAMP|URL` lines, fetches each archived
/// page and its assets, rewrites references for offline browsing, and
/// writes self-contained snapshot trees to disk. Progress is durable:
/// an interrupted run resumes where it left off.
#[derive(Parser, Debug)]
#[command(name = "wayback-archiver")]
#[command(version)]
#[command(about = "A polite Wayback Machine snapshot archiver", long_about = None)]
struct Cli {
    /// Path to the selections file (lines of TIMESTAMP|URL)
    #[arg(value_name = "SELECTIONS", required_unless_present = "stats")]
    selections: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable all pacing delays and the off-peak gate
    #[arg(long)]
    no_delay: bool,

    /// Bypass only the off-peak gate, keeping polite pacing
    #[arg(long)]
    ignore_schedule: bool,

    /// Show statistics from the databases and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Validate config and selections without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.stats {
        return match handle_stats(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Failed to load statistics: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Both remaining modes need the selections file
    let Some(selections) = cli.selections else {
        tracing::error!("A selections file is required");
        return ExitCode::FAILURE;
    };

    if cli.dry_run {
        return match handle_dry_run(&config, &selections) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Dry run failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let auth = match ArchiveAuth::from_env() {
        Ok(auth) => auth,
        Err(e) => {
            tracing::error!("{}", e);
            tracing::error!(
                "Set ARCHIVE_LOGGED_IN_USER and ARCHIVE_LOGGED_IN_SIG before crawling"
            );
            return ExitCode::FAILURE;
        }
    };

    let flags = RunFlags {
        no_delay: cli.no_delay,
        ignore_schedule: cli.ignore_schedule,
    };

    match run_crawl(&config, &auth, &selections, flags).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wayback_archiver=info,warn"),
            1 => EnvFilter::new("wayback_archiver=debug,info"),
            2 => EnvFilter::new("wayback_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the configuration file, or defaults when none is given
fn load_configuration(path: Option<&Path>) -> wayback_archiver::ConfigResult<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
        }
        None => Ok(Config::default()),
    }
}

/// Handles the --stats mode
fn handle_stats(config: &Config) -> wayback_archiver::Result<()> {
    let queue = WorkQueue::open(Path::new(&config.output.queue_db))?;
    let store = AssetStore::open(Path::new(&config.output.asset_db))?;

    let stats = load_statistics(&queue, &store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --dry-run mode: validate inputs and show what would run
fn handle_dry_run(config: &Config, selections_path: &Path) -> wayback_archiver::Result<()> {
    use wayback_archiver::crawler::load_selections;

    println!("=== Dry Run ===\n");

    println!("Archive host: {}", config.archive.host);
    println!("Output directory: {}", config.output.output_dir);
    println!("Page delay: {}s", config.crawler.page_delay_seconds);
    println!("Asset delay: {}ms", config.crawler.asset_delay_ms);
    println!("Asset size limit: {} MB", config.crawler.max_asset_size_mb);
    println!(
        "External assets: {}",
        if config.crawler.fetch_external_assets {
            "fetched"
        } else {
            "skipped"
        }
    );
    if config.schedule.enabled {
        println!(
            "Off-peak window: {} - {}",
            config.schedule.off_peak_start, config.schedule.off_peak_end
        );
    } else {
        println!("Off-peak window: disabled");
    }

    let selections = load_selections(selections_path)?;
    println!("\nSelections ({}):", selections.len());
    for selection in &selections {
        println!("  [{}] {}", selection.timestamp, selection.url);
    }

    match ArchiveAuth::from_env() {
        Ok(_) => println!("\n✓ Archive credentials present"),
        Err(e) => println!("\n✗ {}", e),
    }

    println!("✓ Configuration is valid");

    Ok(())
}
