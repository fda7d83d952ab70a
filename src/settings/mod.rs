//! Runtime settings.

pub mod repository;
pub mod types;

pub use repository::SettingsRepository;
pub use types::{
    RefreshMode, SchedulerSettings, DEFAULT_MAX_ARTICLE_AGE_DAYS, DEFAULT_MAX_CACHE_SIZE_MB,
    DEFAULT_MAX_CONCURRENT_REFRESHES, DEFAULT_UPDATE_INTERVAL_MINUTES, KEY_AUTO_CLEANUP_ENABLED,
    KEY_MAX_ARTICLE_AGE_DAYS, KEY_MAX_CACHE_SIZE_MB, KEY_MAX_CONCURRENT_REFRESHES,
    KEY_REFRESH_MODE, KEY_UPDATE_INTERVAL, MAX_CONCURRENT_REFRESHES_LIMIT,
};
