//! feedkeeper - feed refresh scheduler and article retention engine.
//!
//! Decides when each subscribed feed is due, runs refreshes through a
//! bounded worker pool and keeps the article store within its age and
//! size budgets.

pub mod article;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod logging;
pub mod retention;
pub mod scheduler;
pub mod settings;

pub use article::{Article, ArticleRepository, NewArticle, ReadFilter};
pub use config::Config;
pub use db::{Database, DbPool};
pub use error::{FeedkeeperError, Result};
pub use feed::{Feed, FeedRepository, NewFeed, RefreshInterval, UpdateStatus};
pub use fetcher::{FeedFetcher, FetchOutcome, HttpFeedFetcher};
pub use retention::{ArticleStore, CleanupReport, RetentionEngine, RetentionPolicy};
pub use scheduler::{
    spawn_task_queue, BackgroundScheduler, Priority, ProgressSnapshot, SchedulerOptions,
    SubmitOutcome, Task, TaskQueueHandle, TaskReason,
};
pub use settings::{RefreshMode, SchedulerSettings, SettingsRepository};
