//! Error types for feedkeeper.

use thiserror::Error;

/// Common error type for feedkeeper.
#[derive(Error, Debug)]
pub enum FeedkeeperError {
    /// Database error.
    ///
    /// Errors from sqlx are automatically converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for values crossing the settings/import boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Feed fetch or parse error.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A refresh was skipped because shutdown was requested.
    #[error("refresh cancelled")]
    Cancelled,

    /// The task queue actor is no longer running.
    #[error("task queue unavailable")]
    QueueUnavailable,
}

impl From<sqlx::Error> for FeedkeeperError {
    fn from(e: sqlx::Error) -> Self {
        FeedkeeperError::Database(e.to_string())
    }
}

/// Result type alias for feedkeeper operations.
pub type Result<T> = std::result::Result<T, FeedkeeperError>;
