//! Typed runtime settings.
//!
//! The scheduler reads a [`SchedulerSettings`] snapshot once per cycle, so
//! a change made while a cycle is running takes effect on the next tick.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::repository::SettingsRepository;
use crate::db::DbPool;
use crate::Result;

/// Settings key for the global refresh mode.
pub const KEY_REFRESH_MODE: &str = "refresh_mode";
/// Settings key for the global refresh interval (minutes).
pub const KEY_UPDATE_INTERVAL: &str = "update_interval";
/// Settings key for the worker pool size.
pub const KEY_MAX_CONCURRENT_REFRESHES: &str = "max_concurrent_refreshes";
/// Settings key for the auto-cleanup switch.
pub const KEY_AUTO_CLEANUP_ENABLED: &str = "auto_cleanup_enabled";
/// Settings key for the article age limit (days).
pub const KEY_MAX_ARTICLE_AGE_DAYS: &str = "max_article_age_days";
/// Settings key for the cache size limit (MB).
pub const KEY_MAX_CACHE_SIZE_MB: &str = "max_cache_size_mb";

/// Default global refresh interval in minutes.
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: u32 = 30;
/// Default worker pool size.
pub const DEFAULT_MAX_CONCURRENT_REFRESHES: usize = 5;
/// Upper bound for the worker pool size.
pub const MAX_CONCURRENT_REFRESHES_LIMIT: usize = 64;
/// Default article age limit in days.
pub const DEFAULT_MAX_ARTICLE_AGE_DAYS: u32 = 30;
/// Default cache size limit in megabytes.
pub const DEFAULT_MAX_CACHE_SIZE_MB: u64 = 500;

/// Global refresh mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Every feed without an override uses the global interval.
    #[default]
    Fixed,
    /// Feeds without an override use the intelligent calculator.
    Intelligent,
}

impl RefreshMode {
    /// Convert to the stored string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::Fixed => "fixed",
            RefreshMode::Intelligent => "intelligent",
        }
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RefreshMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(RefreshMode::Fixed),
            "intelligent" => Ok(RefreshMode::Intelligent),
            _ => Err(format!("unknown refresh mode: {s}")),
        }
    }
}

/// Snapshot of the settings that drive one scheduler cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Global refresh mode.
    pub refresh_mode: RefreshMode,
    /// Global refresh interval in minutes.
    pub update_interval_minutes: u32,
    /// Worker pool size (maintained by the network speed probe).
    pub max_concurrent_refreshes: usize,
    /// Whether cleanup runs after each cycle.
    pub auto_cleanup_enabled: bool,
    /// Article age limit in days (0 disables the age pass).
    pub max_article_age_days: u32,
    /// Cache size limit in megabytes (0 disables the size pass).
    pub max_cache_size_mb: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            refresh_mode: RefreshMode::Fixed,
            update_interval_minutes: DEFAULT_UPDATE_INTERVAL_MINUTES,
            max_concurrent_refreshes: DEFAULT_MAX_CONCURRENT_REFRESHES,
            auto_cleanup_enabled: false,
            max_article_age_days: DEFAULT_MAX_ARTICLE_AGE_DAYS,
            max_cache_size_mb: DEFAULT_MAX_CACHE_SIZE_MB,
        }
    }
}

/// Parse a setting, falling back to `default` when missing, unparsable or
/// rejected by `valid`.
fn parse_setting<T>(
    values: &HashMap<String, String>,
    key: &str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T
where
    T: FromStr + fmt::Debug,
{
    let Some(raw) = values.get(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!(
                "Invalid value {:?} for setting '{}', using default {:?}",
                raw, key, default
            );
            default
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl SchedulerSettings {
    /// Build a snapshot from raw key/value pairs.
    ///
    /// Never fails: every malformed value is replaced by its default.
    pub fn from_map(values: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let refresh_mode = parse_setting(values, KEY_REFRESH_MODE, defaults.refresh_mode, |_| true);
        let update_interval_minutes = parse_setting(
            values,
            KEY_UPDATE_INTERVAL,
            defaults.update_interval_minutes,
            |v| *v >= 1,
        );
        let max_concurrent_refreshes = match values.get(KEY_MAX_CONCURRENT_REFRESHES) {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(n) => n.clamp(1, MAX_CONCURRENT_REFRESHES_LIMIT as i64) as usize,
                Err(_) => {
                    warn!(
                        "Invalid value {:?} for setting '{}', using default {}",
                        raw, KEY_MAX_CONCURRENT_REFRESHES, defaults.max_concurrent_refreshes
                    );
                    defaults.max_concurrent_refreshes
                }
            },
            None => defaults.max_concurrent_refreshes,
        };
        let auto_cleanup_enabled = match values.get(KEY_AUTO_CLEANUP_ENABLED) {
            Some(raw) => parse_bool(raw).unwrap_or_else(|| {
                warn!(
                    "Invalid value {:?} for setting '{}', using default {}",
                    raw, KEY_AUTO_CLEANUP_ENABLED, defaults.auto_cleanup_enabled
                );
                defaults.auto_cleanup_enabled
            }),
            None => defaults.auto_cleanup_enabled,
        };
        let max_article_age_days = parse_setting(
            values,
            KEY_MAX_ARTICLE_AGE_DAYS,
            defaults.max_article_age_days,
            |_| true,
        );
        let max_cache_size_mb = parse_setting(
            values,
            KEY_MAX_CACHE_SIZE_MB,
            defaults.max_cache_size_mb,
            |_| true,
        );

        Self {
            refresh_mode,
            update_interval_minutes,
            max_concurrent_refreshes,
            auto_cleanup_enabled,
            max_article_age_days,
            max_cache_size_mb,
        }
    }

    /// Read the current snapshot from the settings table.
    pub async fn load(pool: &DbPool) -> Result<Self> {
        let values = SettingsRepository::new(pool).get_all().await?;
        Ok(Self::from_map(&values))
    }

    /// Persist every field of this snapshot.
    pub async fn save(&self, pool: &DbPool) -> Result<()> {
        let repo = SettingsRepository::new(pool);
        repo.set(KEY_REFRESH_MODE, self.refresh_mode.as_str()).await?;
        repo.set(KEY_UPDATE_INTERVAL, &self.update_interval_minutes.to_string())
            .await?;
        repo.set(
            KEY_MAX_CONCURRENT_REFRESHES,
            &self.max_concurrent_refreshes.to_string(),
        )
        .await?;
        repo.set(
            KEY_AUTO_CLEANUP_ENABLED,
            &self.auto_cleanup_enabled.to_string(),
        )
        .await?;
        repo.set(
            KEY_MAX_ARTICLE_AGE_DAYS,
            &self.max_article_age_days.to_string(),
        )
        .await?;
        repo.set(KEY_MAX_CACHE_SIZE_MB, &self.max_cache_size_mb.to_string())
            .await?;
        Ok(())
    }

    /// Global refresh interval.
    pub fn global_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.update_interval_minutes) * 60)
    }
}
