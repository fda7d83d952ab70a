//! Refresh interval policy.
//!
//! Resolves how long a feed may go without a refresh, combining the
//! per-feed [`RefreshInterval`] with the global refresh mode.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::feed::{Feed, RefreshInterval};
use crate::settings::RefreshMode;

/// Shortest interval the intelligent calculator will produce (15 minutes).
pub const INTELLIGENT_MIN_MINUTES: u64 = 15;

/// Longest interval the intelligent calculator will produce (7 days).
pub const INTELLIGENT_MAX_MINUTES: u64 = 7 * 24 * 60;

/// Interval used when a feed has no usable cadence statistics (4 hours).
pub const INTELLIGENT_DEFAULT_MINUTES: u64 = 240;

/// Minutes in a 30-day month, halved.
///
/// A feed publishing `n` articles per month is checked about twice per
/// expected article: `interval = 21600 / n` minutes.
const INTELLIGENT_SCALE: f64 = 21_600.0;

/// Interval returned for feeds that are never refreshed automatically.
pub const NEVER: Duration = Duration::MAX;

/// Intelligent interval for a publishing cadence in articles per month.
///
/// Non-increasing in `articles_per_month` and bounded to
/// `[INTELLIGENT_MIN_MINUTES, INTELLIGENT_MAX_MINUTES]`.
pub fn intelligent_interval(articles_per_month: f64) -> Duration {
    if !articles_per_month.is_finite() || articles_per_month <= 0.0 {
        return minutes(INTELLIGENT_DEFAULT_MINUTES);
    }

    let raw = INTELLIGENT_SCALE / articles_per_month;
    let clamped = raw.clamp(
        INTELLIGENT_MIN_MINUTES as f64,
        INTELLIGENT_MAX_MINUTES as f64,
    );
    minutes(clamped.round() as u64)
}

/// Required interval between refreshes of `feed`.
pub fn required_interval(
    feed: &Feed,
    mode: RefreshMode,
    global_interval_minutes: u32,
) -> Duration {
    match feed.refresh_interval {
        RefreshInterval::Never => NEVER,
        RefreshInterval::Custom(n) => minutes(u64::from(n)),
        RefreshInterval::Intelligent => intelligent_interval(feed.articles_per_month),
        RefreshInterval::UseGlobal => match mode {
            RefreshMode::Fixed => minutes(u64::from(global_interval_minutes)),
            RefreshMode::Intelligent => intelligent_interval(feed.articles_per_month),
        },
    }
}

/// Whether `feed` is due at `now` given its required interval.
///
/// A feed that has never been refreshed is due immediately, unless it is
/// set to never refresh.
pub fn is_due(feed: &Feed, required: Duration, now: DateTime<Utc>) -> bool {
    if feed.refresh_interval == RefreshInterval::Never || required == NEVER {
        return false;
    }

    match feed.elapsed_since_update(now) {
        None => true,
        Some(elapsed) => match elapsed.to_std() {
            Ok(elapsed) => elapsed >= required,
            // Last update lies in the future (clock skew).
            Err(_) => false,
        },
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}
