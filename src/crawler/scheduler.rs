//! Off-peak scheduling gate
//!
//! The crawl loop can be confined to an off-peak window of local wall-clock
//! time. The gate only delays when the loop may run; it has no effect on
//! fetch correctness.

use crate::config::{parse_window_time, ScheduleConfig};
use crate::ConfigError;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use std::time::Duration;

/// An optional daily window of allowed crawl time
///
/// The window may span midnight (`start > end`), e.g. 22:00–06:00.
#[derive(Debug, Clone, Copy)]
pub struct OffPeakWindow {
    enabled: bool,
    start: NaiveTime,
    end: NaiveTime,
}

impl OffPeakWindow {
    /// Builds the window from configuration
    ///
    /// `force_disable` turns the gate off regardless of the config, for the
    /// no-delay and ignore-schedule modes.
    pub fn from_config(config: &ScheduleConfig, force_disable: bool) -> Result<Self, ConfigError> {
        let start = parse_window_time(&config.off_peak_start, "off-peak-start")?;
        let end = parse_window_time(&config.off_peak_end, "off-peak-end")?;
        Ok(Self {
            enabled: config.enabled && !force_disable,
            start,
            end,
        })
    }

    /// A gate that never blocks
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
    }

    /// Whether the gate is active at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a wall-clock time falls inside the window
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return true;
        }
        if self.start > self.end {
            // Spans midnight
            time >= self.start || time <= self.end
        } else {
            time >= self.start && time <= self.end
        }
    }

    /// How long to wait from `now` until the window opens
    ///
    /// Returns `None` when the window is already open (or the gate is
    /// disabled).
    pub fn wait_duration(&self, now: NaiveDateTime) -> Option<Duration> {
        if self.contains(now.time()) {
            return None;
        }

        let today_start = now.date().and_time(self.start);
        let opens_at = if now.time() < self.start {
            today_start
        } else {
            today_start + TimeDelta::days(1)
        };

        (opens_at - now).to_std().ok()
    }

    /// Blocks until the local wall clock is inside the window
    pub async fn wait_if_needed(&self) {
        loop {
            let now = Local::now().naive_local();
            match self.wait_duration(now) {
                None => return,
                Some(wait) => {
                    tracing::info!(
                        "Outside off-peak window ({} - {}), waiting {:.0} minutes",
                        self.start,
                        self.end,
                        wait.as_secs_f64() / 60.0
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
