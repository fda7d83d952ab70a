//! Feed types for feedkeeper.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::FeedkeeperError;

/// Per-feed refresh interval setting.
///
/// Stored in the database as an integer: `0` = use the global setting,
/// `-1` = intelligent, `-2` = never, `n > 0` = fixed interval in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum RefreshInterval {
    /// Defer to the global refresh mode.
    #[default]
    UseGlobal,
    /// Always use the intelligent calculator.
    Intelligent,
    /// Never refresh automatically.
    Never,
    /// Fixed interval in minutes.
    Custom(u32),
}

impl RefreshInterval {
    /// Stored value for [`RefreshInterval::UseGlobal`].
    pub const USE_GLOBAL: i64 = 0;
    /// Stored value for [`RefreshInterval::Intelligent`].
    pub const INTELLIGENT: i64 = -1;
    /// Stored value for [`RefreshInterval::Never`].
    pub const NEVER: i64 = -2;

    /// Convert to the stored integer representation.
    pub fn to_stored(self) -> i64 {
        match self {
            RefreshInterval::UseGlobal => Self::USE_GLOBAL,
            RefreshInterval::Intelligent => Self::INTELLIGENT,
            RefreshInterval::Never => Self::NEVER,
            RefreshInterval::Custom(minutes) => i64::from(minutes),
        }
    }

    /// Convert a value read back from the database.
    ///
    /// Illegal values are clamped to [`RefreshInterval::UseGlobal`] so that
    /// a corrupted row can never disable or flood a feed.
    pub fn from_stored(raw: i64) -> Self {
        match RefreshInterval::try_from(raw) {
            Ok(interval) => interval,
            Err(e) => {
                warn!("Clamping stored refresh interval to global: {}", e);
                RefreshInterval::UseGlobal
            }
        }
    }
}

impl TryFrom<i64> for RefreshInterval {
    type Error = FeedkeeperError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            Self::USE_GLOBAL => Ok(RefreshInterval::UseGlobal),
            Self::INTELLIGENT => Ok(RefreshInterval::Intelligent),
            Self::NEVER => Ok(RefreshInterval::Never),
            n if n > 0 => u32::try_from(n)
                .map(RefreshInterval::Custom)
                .map_err(|_| {
                    FeedkeeperError::Validation(format!("refresh interval {n} is too large"))
                }),
            n => Err(FeedkeeperError::Validation(format!(
                "refresh interval {n} is not one of 0, -1, -2 or a positive number of minutes"
            ))),
        }
    }
}

impl From<RefreshInterval> for i64 {
    fn from(interval: RefreshInterval) -> Self {
        interval.to_stored()
    }
}

/// Outcome of the most recent refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// Never refreshed.
    #[default]
    Pending,
    /// Last refresh succeeded.
    Success,
    /// Last refresh failed.
    Failed,
}

impl UpdateStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::Pending => "pending",
            UpdateStatus::Success => "success",
            UpdateStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UpdateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(UpdateStatus::Pending),
            "success" => Ok(UpdateStatus::Success),
            "failed" => Ok(UpdateStatus::Failed),
            _ => Err(format!("unknown update status: {s}")),
        }
    }
}

/// A feed subscription.
#[derive(Debug, Clone)]
pub struct Feed {
    /// Feed ID.
    pub id: i64,
    /// Feed title.
    pub title: String,
    /// Feed URL.
    pub url: String,
    /// Per-feed refresh interval setting.
    pub refresh_interval: RefreshInterval,
    /// Time of the last refresh attempt (successful or not).
    pub last_updated: Option<DateTime<Utc>>,
    /// Outcome of the last refresh attempt.
    pub last_update_status: UpdateStatus,
    /// Error message from the last failed attempt.
    pub last_error: Option<String>,
    /// Rolling average of articles published per month.
    pub articles_per_month: f64,
    /// When the feed was subscribed.
    pub created_at: DateTime<Utc>,
}

impl Feed {
    /// Time elapsed since the last refresh attempt, `None` if never refreshed.
    pub fn elapsed_since_update(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_updated.map(|last| now.signed_duration_since(last))
    }
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Feed title.
    pub title: String,
    /// Feed URL.
    pub url: String,
    /// Per-feed refresh interval setting.
    pub refresh_interval: RefreshInterval,
}

impl NewFeed {
    /// Create a new feed that follows the global refresh setting.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            refresh_interval: RefreshInterval::UseGlobal,
        }
    }

    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: RefreshInterval) -> Self {
        self.refresh_interval = interval;
        self
    }
}
