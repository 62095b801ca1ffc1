use serde::Deserialize;

use crate::ConfigError;

/// Main configuration structure for the archiver
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Upstream archive configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Hostname of the web archive service
    #[serde(default = "default_archive_host")]
    pub host: String,
}

/// Crawl pacing and asset-handling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Delay between successive pages (seconds)
    #[serde(rename = "page-delay-seconds", default = "default_page_delay")]
    pub page_delay_seconds: u64,

    /// Delay between successive asset downloads within a page (milliseconds)
    #[serde(rename = "asset-delay-ms", default = "default_asset_delay")]
    pub asset_delay_ms: u64,

    /// Assets larger than this are skipped and recorded for manual recovery
    #[serde(rename = "max-asset-size-mb", default = "default_max_asset_size")]
    pub max_asset_size_mb: f64,

    /// Whether third-party assets are fetched at all
    #[serde(rename = "fetch-external-assets", default = "default_true")]
    pub fetch_external_assets: bool,

    /// Reserved for a future parallel fetcher; the authenticated path is
    /// serial and this must be 1.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

/// Off-peak scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Whether the off-peak gate is active
    #[serde(default)]
    pub enabled: bool,

    /// Start of the off-peak window, local time, `HH:MM`
    #[serde(rename = "off-peak-start", default = "default_off_peak_start")]
    pub off_peak_start: String,

    /// End of the off-peak window, local time, `HH:MM` (may be before the
    /// start, in which case the window spans midnight)
    #[serde(rename = "off-peak-end", default = "default_off_peak_end")]
    pub off_peak_end: String,
}

/// Output path configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Root directory for snapshot trees
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: String,

    /// Path to the work-queue database
    #[serde(rename = "queue-db", default = "default_queue_db")]
    pub queue_db: String,

    /// Path to the asset-store database
    #[serde(rename = "asset-db", default = "default_asset_db")]
    pub asset_db: String,
}

fn default_archive_host() -> String {
    "web.archive.org".to_string()
}

fn default_page_delay() -> u64 {
    5
}

fn default_asset_delay() -> u64 {
    500
}

fn default_max_asset_size() -> f64 {
    50.0
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> u32 {
    1
}

fn default_off_peak_start() -> String {
    "22:00".to_string()
}

fn default_off_peak_end() -> String {
    "06:00".to_string()
}

fn default_output_dir() -> String {
    "archived_pages".to_string()
}

fn default_queue_db() -> String {
    "crawler_state.db".to_string()
}

fn default_asset_db() -> String {
    "assets.db".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            host: default_archive_host(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_delay_seconds: default_page_delay(),
            asset_delay_ms: default_asset_delay(),
            max_asset_size_mb: default_max_asset_size(),
            fetch_external_assets: true,
            concurrency: default_concurrency(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            off_peak_start: default_off_peak_start(),
            off_peak_end: default_off_peak_end(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            queue_db: default_queue_db(),
            asset_db: default_asset_db(),
        }
    }
}

/// Archive credentials loaded from the environment
///
/// The cookie pair is mandatory; the S3-style key pair only adds an extra
/// `Authorization: LOW {access}:{secret}` header when both halves are set.
#[derive(Debug, Clone)]
pub struct ArchiveAuth {
    pub logged_in_user: String,
    pub logged_in_sig: String,
    pub s3_access: Option<String>,
    pub s3_secret: Option<String>,
}

impl ArchiveAuth {
    /// Loads credentials from the process environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingAuth` if either required variable is
    /// absent or empty. Missing credentials abort startup: unauthenticated
    /// requests get a far harsher rate limit from the archive.
    pub fn from_env() -> Result<Self, ConfigError> {
        let logged_in_user = require_env("ARCHIVE_LOGGED_IN_USER")?;
        let logged_in_sig = require_env("ARCHIVE_LOGGED_IN_SIG")?;

        let s3_access = optional_env("ARCHIVE_S3_ACCESS");
        let s3_secret = optional_env("ARCHIVE_S3_SECRET");

        Ok(Self {
            logged_in_user,
            logged_in_sig,
            s3_access,
            s3_secret,
        })
    }

    /// The cookie header value carried on every archive request
    pub fn cookie_header(&self) -> String {
        format!(
            "logged-in-user={}; logged-in-sig={}",
            self.logged_in_user, self.logged_in_sig
        )
    }

    /// The optional `LOW` authorization header value
    ///
    /// Present only when both S3 keys are configured.
    pub fn authorization_header(&self) -> Option<String> {
        match (&self.s3_access, &self.s3_secret) {
            (Some(access), Some(secret)) => Some(format!("LOW {}:{}", access, secret)),
            _ => None,
        }
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingAuth(name.to_string())),
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
