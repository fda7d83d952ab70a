//! Article types for feedkeeper.

use chrono::{DateTime, Utc};

/// A persisted article.
#[derive(Debug, Clone)]
pub struct Article {
    /// Article ID.
    pub id: i64,
    /// Owning feed ID.
    pub feed_id: i64,
    /// Unique identifier within the feed.
    pub guid: String,
    /// Article title.
    pub title: String,
    /// Link to the original article.
    pub url: Option<String>,
    /// Cached content.
    pub content: Option<String>,
    /// Publication time.
    pub published_at: DateTime<Utc>,
    /// Whether the user has read the article.
    pub is_read: bool,
    /// Whether the user starred the article.
    pub is_favorite: bool,
    /// Whether the user saved the article for later.
    pub is_read_later: bool,
}

impl Article {
    /// Protected articles are exempt from every automatic cleanup.
    pub fn is_protected(&self) -> bool {
        self.is_favorite || self.is_read_later
    }
}

/// New article for insertion.
#[derive(Debug, Clone)]
pub struct NewArticle {
    /// Owning feed ID.
    pub feed_id: i64,
    /// Unique identifier within the feed.
    pub guid: String,
    /// Article title.
    pub title: String,
    /// Link to the original article.
    pub url: Option<String>,
    /// Cached content.
    pub content: Option<String>,
    /// Publication time.
    pub published_at: DateTime<Utc>,
}

impl NewArticle {
    /// Create a new article.
    pub fn new(
        feed_id: i64,
        guid: impl Into<String>,
        title: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_id,
            guid: guid.into(),
            title: title.into(),
            url: None,
            content: None,
            published_at,
        }
    }

    /// Set the link.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Which articles a cleanup statement may touch, by read state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFilter {
    /// Read and unread articles.
    Any,
    /// Read articles only.
    ReadOnly,
    /// Unread articles only.
    UnreadOnly,
}

impl ReadFilter {
    /// Whether an article with the given read state passes the filter.
    pub fn matches(&self, is_read: bool) -> bool {
        match self {
            ReadFilter::Any => true,
            ReadFilter::ReadOnly => is_read,
            ReadFilter::UnreadOnly => !is_read,
        }
    }

    /// SQL condition for this filter.
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            ReadFilter::Any => "1 = 1",
            ReadFilter::ReadOnly => "is_read = 1",
            ReadFilter::UnreadOnly => "is_read = 0",
        }
    }
}
