//! Article retention.
//!
//! Keeps the article store within the configured age and size budgets.
//! Favorite and read-later articles are exempt from every cleanup path.

mod engine;
mod store;

pub use engine::{
    CleanupReport, RetentionEngine, RetentionPolicy, RetentionTarget, DEFAULT_BATCH_SIZE,
    READ_RETENTION_DAYS, SIZE_TARGET_RATIO, UNREAD_MAX_RETENTION_DAYS, UNREAD_RETENTION_DAYS,
};
pub use store::ArticleStore;
