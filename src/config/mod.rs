//! Configuration module
//!
//! Crawl behavior is configured through a TOML file; archive credentials are
//! read from the environment at startup so they never land in config files.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{
    ArchiveAuth, ArchiveConfig, Config, CrawlerConfig, OutputConfig, ScheduleConfig,
};
pub use validation::{parse_window_time, validate};
