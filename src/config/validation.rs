//! Configuration validation
//!
//! Catches config mistakes at startup rather than mid-crawl.

use crate::config::types::Config;
use crate::ConfigError;
use chrono::NaiveTime;

/// Validates a loaded configuration
///
/// # Checks
///
/// * Archive host is non-empty and carries no path
/// * Size limit is positive
/// * Concurrency is exactly 1 (the authenticated path is serial)
/// * Off-peak times parse as `HH:MM` and are not equal
/// * Output paths are non-empty
///
/// # Arguments
///
/// * `config` - The configuration to validate
///
/// # Returns
///
/// * `Ok(())` - Configuration is valid
/// * `Err(ConfigError::Validation)` - With a description of the problem
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let host = config.archive.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation(
            "archive.host must not be empty".to_string(),
        ));
    }
    // A bare hostname (https assumed) or a scheme-qualified base URL; a
    // path after the host is not.
    let authority = host.split_once("://").map(|(_, rest)| rest).unwrap_or(host);
    if authority.trim_end_matches('/').contains('/') {
        return Err(ConfigError::Validation(format!(
            "archive.host must be a hostname or base URL without a path, got: {}",
            host
        )));
    }

    if config.crawler.max_asset_size_mb <= 0.0 {
        return Err(ConfigError::Validation(
            "crawler.max-asset-size-mb must be positive".to_string(),
        ));
    }

    if config.crawler.concurrency != 1 {
        return Err(ConfigError::Validation(
            "crawler.concurrency other than 1 is reserved for future use".to_string(),
        ));
    }

    let start = parse_window_time(&config.schedule.off_peak_start, "off-peak-start")?;
    let end = parse_window_time(&config.schedule.off_peak_end, "off-peak-end")?;
    if config.schedule.enabled && start == end {
        return Err(ConfigError::Validation(
            "schedule window start and end must differ".to_string(),
        ));
    }

    if config.output.output_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output.output-dir must not be empty".to_string(),
        ));
    }
    if config.output.queue_db.trim().is_empty() || config.output.asset_db.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output database paths must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Parses an `HH:MM` window boundary
pub fn parse_window_time(value: &str, field: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        ConfigError::Validation(format!("schedule.{} is not a valid HH:MM time: {}", field, value))
    })
}
