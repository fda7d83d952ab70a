//! Feed fetching.
//!
//! The task queue does not know how a feed is fetched; it calls a
//! [`FeedFetcher`] for every task it runs. [`HttpFeedFetcher`] is the
//! default implementation used by the binary.

mod http;

pub use http::{parse_feed, validate_url, HttpFeedFetcher, ParsedEntry};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::feed::Feed;
use crate::Result;

/// Result of a successful refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOutcome {
    /// Number of articles that were not stored before.
    pub new_articles: usize,
    /// Recomputed publishing cadence.
    pub articles_per_month: f64,
}

/// Fetches, parses and persists a single feed.
///
/// Implementations must update the feed's `last_updated` and
/// `last_update_status` whether the refresh succeeds or fails. There is no
/// retry: a failed feed is picked up again when the scheduler next finds it
/// due.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Refresh `feed`.
    ///
    /// A token that is already cancelled aborts the refresh before any
    /// network I/O. Cancellation after the request started is not observed.
    async fn fetch_feed(
        &self,
        cancel: &CancellationToken,
        feed: &Feed,
        is_manual: bool,
    ) -> Result<FetchOutcome>;
}
