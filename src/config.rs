//! Configuration module for feedkeeper.
//!
//! Static configuration is read from a TOML file. Runtime knobs that the
//! user changes while the application is running (refresh mode, cleanup
//! limits, ...) live in the settings table instead, see [`crate::settings`].

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{FeedkeeperError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedkeeper.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedkeeper.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Background scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How often the driver wakes up to look for due feeds, in seconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Width of the stagger window in seconds (0 = same as the tick).
    ///
    /// May exceed the tick period: a feed still waiting in its slot is
    /// skipped by later cycles until it has been submitted.
    #[serde(default)]
    pub stagger_window_secs: u64,
    /// Pause between individual feed checks, in milliseconds.
    #[serde(default = "default_feed_check_pause")]
    pub feed_check_pause_ms: u64,
    /// Number of queued tasks exposed in progress snapshots.
    #[serde(default = "default_queued_snapshot_limit")]
    pub queued_snapshot_limit: usize,
    /// Articles deleted per batch by the size-based cleanup.
    #[serde(default = "default_cleanup_batch_size")]
    pub cleanup_batch_size: usize,
    /// Capacity of the task queue's command channel.
    #[serde(default = "default_queue_channel_capacity")]
    pub queue_channel_capacity: usize,
}

fn default_tick_interval() -> u64 {
    60
}

fn default_feed_check_pause() -> u64 {
    100
}

fn default_queued_snapshot_limit() -> usize {
    3
}

fn default_cleanup_batch_size() -> usize {
    100
}

fn default_queue_channel_capacity() -> usize {
    64
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            stagger_window_secs: 0,
            feed_check_pause_ms: default_feed_check_pause(),
            queued_snapshot_limit: default_queued_snapshot_limit(),
            cleanup_batch_size: default_cleanup_batch_size(),
            queue_channel_capacity: default_queue_channel_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Tick period of the background driver.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Stagger window; falls back to the tick period when unset.
    pub fn stagger_window(&self) -> Duration {
        if self.stagger_window_secs == 0 {
            self.tick_interval()
        } else {
            Duration::from_secs(self.stagger_window_secs)
        }
    }

    /// Pause inserted between feed checks.
    pub fn feed_check_pause(&self) -> Duration {
        Duration::from_millis(self.feed_check_pause_ms)
    }
}

/// HTTP fetcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    "feedkeeper/0.1 (RSS Reader)".to_string()
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Fetcher configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedkeeperError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedkeeperError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDKEEPER_DB_PATH`: Override the database path
    /// - `FEEDKEEPER_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FEEDKEEPER_DB_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("FEEDKEEPER_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_interval_secs == 0 {
            return Err(FeedkeeperError::Config(
                "scheduler.tick_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.cleanup_batch_size == 0 {
            return Err(FeedkeeperError::Config(
                "scheduler.cleanup_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.queue_channel_capacity == 0 {
            return Err(FeedkeeperError::Config(
                "scheduler.queue_channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
