//! Feed repository for feedkeeper.

use chrono::{DateTime, Utc};

use super::types::{Feed, NewFeed, RefreshInterval, UpdateStatus};
use crate::db::DbPool;
use crate::{FeedkeeperError, Result};

/// Row type for a feed from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: i64,
    title: String,
    url: String,
    refresh_interval: i64,
    last_updated: Option<DateTime<Utc>>,
    last_update_status: String,
    last_error: Option<String>,
    articles_per_month: f64,
    created_at: String,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            title: row.title,
            url: row.url,
            refresh_interval: RefreshInterval::from_stored(row.refresh_interval),
            last_updated: row.last_updated,
            last_update_status: row.last_update_status.parse().unwrap_or_default(),
            last_error: row.last_error,
            articles_per_month: row.articles_per_month,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

const FEED_COLUMNS: &str = "id, title, url, refresh_interval, last_updated, last_update_status, \
                            last_error, articles_per_month, created_at";

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    pub async fn create(&self, feed: &NewFeed) -> Result<Feed> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feeds (title, url, refresh_interval)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&feed.title)
        .bind(&feed.url)
        .bind(feed.refresh_interval.to_stored())
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| FeedkeeperError::NotFound(format!("feed {id}")))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Feed::from))
    }

    /// List all feeds in subscription order.
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY id ASC");
        let rows = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Count all feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Change a feed's refresh interval.
    pub async fn set_refresh_interval(&self, id: i64, interval: RefreshInterval) -> Result<bool> {
        let result = sqlx::query("UPDATE feeds SET refresh_interval = $1 WHERE id = $2")
            .bind(interval.to_stored())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the last refresh timestamp.
    pub async fn set_last_updated(&self, id: i64, at: Option<DateTime<Utc>>) -> Result<bool> {
        let result = sqlx::query("UPDATE feeds SET last_updated = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a successful refresh attempt.
    pub async fn record_success(
        &self,
        id: i64,
        at: DateTime<Utc>,
        articles_per_month: f64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_updated = $1,
                last_update_status = $2,
                last_error = NULL,
                articles_per_month = $3
            WHERE id = $4
            "#,
        )
        .bind(at)
        .bind(UpdateStatus::Success.as_str())
        .bind(articles_per_month)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a failed refresh attempt.
    ///
    /// `last_updated` still moves forward so the feed waits a full interval
    /// before the next attempt.
    pub async fn record_failure(&self, id: i64, at: DateTime<Utc>, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_updated = $1,
                last_update_status = $2,
                last_error = $3
            WHERE id = $4
            "#,
        )
        .bind(at)
        .bind(UpdateStatus::Failed.as_str())
        .bind(error)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a feed and its articles.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Parse a datetime string written by SQLite's `datetime('now')`.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_feed() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());

        let feed = repo
            .create(&NewFeed::new("Tech Blog", "https://example.com/feed.xml"))
            .await
            .unwrap();

        assert!(feed.id > 0);
        assert_eq!(feed.title, "Tech Blog");
        assert_eq!(feed.refresh_interval, RefreshInterval::UseGlobal);
        assert_eq!(feed.last_update_status, UpdateStatus::Pending);
        assert!(feed.last_updated.is_none());
    }

    #[tokio::test]
    async fn test_create_with_interval_and_list() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());

        repo.create(&NewFeed::new("A", "https://a.example.com/rss"))
            .await
            .unwrap();
        repo.create(
            &NewFeed::new("B", "https://b.example.com/rss")
                .with_refresh_interval(RefreshInterval::Never),
        )
        .await
        .unwrap();

        let feeds = repo.list_all().await.unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].title, "A");
        assert_eq!(feeds[1].refresh_interval, RefreshInterval::Never);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_illegal_stored_interval_is_clamped() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let feed = repo
            .create(&NewFeed::new("A", "https://a.example.com/rss"))
            .await
            .unwrap();

        sqlx::query("UPDATE feeds SET refresh_interval = -42 WHERE id = $1")
            .bind(feed.id)
            .execute(db.pool())
            .await
            .unwrap();

        let feed = repo.get_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(feed.refresh_interval, RefreshInterval::UseGlobal);
    }

    #[tokio::test]
    async fn test_record_success_and_failure() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let feed = repo
            .create(&NewFeed::new("A", "https://a.example.com/rss"))
            .await
            .unwrap();

        let at = Utc::now();
        repo.record_failure(feed.id, at, "connection refused")
            .await
            .unwrap();
        let failed = repo.get_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(failed.last_update_status, UpdateStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("connection refused"));
        assert!(failed.last_updated.is_some());

        repo.record_success(feed.id, at, 12.5).await.unwrap();
        let ok = repo.get_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(ok.last_update_status, UpdateStatus::Success);
        assert!(ok.last_error.is_none());
        assert_eq!(ok.articles_per_month, 12.5);
    }

    #[tokio::test]
    async fn test_set_refresh_interval() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let feed = repo
            .create(&NewFeed::new("A", "https://a.example.com/rss"))
            .await
            .unwrap();

        assert!(repo
            .set_refresh_interval(feed.id, RefreshInterval::Custom(45))
            .await
            .unwrap());
        let feed = repo.get_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(feed.refresh_interval, RefreshInterval::Custom(45));
    }

    #[tokio::test]
    async fn test_delete_feed() {
        let db = setup_db().await;
        let repo = FeedRepository::new(db.pool());
        let feed = repo
            .create(&NewFeed::new("A", "https://a.example.com/rss"))
            .await
            .unwrap();

        assert!(repo.delete(feed.id).await.unwrap());
        assert!(repo.get_by_id(feed.id).await.unwrap().is_none());
    }
}
