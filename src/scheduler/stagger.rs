//! Stagger planner.

use std::time::Duration;

/// Deterministic delay for `feed_id` within `window`.
///
/// Feed IDs are spread uniformly over `[0, window)` by their position
/// modulo `total_feeds`; the same inputs always yield the same delay.
pub fn delay(feed_id: i64, total_feeds: usize, window: Duration) -> Duration {
    if total_feeds == 0 || window.is_zero() {
        return Duration::ZERO;
    }

    let total = total_feeds as u128;
    let slot = i128::from(feed_id).rem_euclid(total as i128) as u128;
    let nanos = window.as_nanos() * slot / total;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
