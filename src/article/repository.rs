//! Article repository for feedkeeper.
//!
//! Every delete statement in this file carries [`UNPROTECTED`]: favorite
//! and read-later articles are never removed by automatic cleanup.

use chrono::{DateTime, Utc};

use super::types::{Article, NewArticle, ReadFilter};
use crate::db::DbPool;
use crate::Result;

/// Condition shared by every cleanup statement.
const UNPROTECTED: &str = "is_favorite = 0 AND is_read_later = 0";

/// Row type for an article from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    feed_id: i64,
    guid: String,
    title: String,
    url: Option<String>,
    content: Option<String>,
    published_at: DateTime<Utc>,
    is_read: bool,
    is_favorite: bool,
    is_read_later: bool,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            feed_id: row.feed_id,
            guid: row.guid,
            title: row.title,
            url: row.url,
            content: row.content,
            published_at: row.published_at,
            is_read: row.is_read,
            is_favorite: row.is_favorite,
            is_read_later: row.is_read_later,
        }
    }
}

/// Repository for article operations.
pub struct ArticleRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ArticleRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert an article, ignoring duplicates (same feed_id + guid).
    ///
    /// Returns the new ID, or `None` if the article already existed.
    pub async fn create_or_ignore(&self, article: &NewArticle) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO articles (feed_id, guid, title, url, content, published_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(feed_id, guid) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(article.feed_id)
        .bind(&article.guid)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.content)
        .bind(article.published_at)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Get an article by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, feed_id, guid, title, url, content, published_at,
                   is_read, is_favorite, is_read_later
            FROM articles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Article::from))
    }

    /// Count all articles.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count favorite or read-later articles.
    pub async fn count_protected(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE is_favorite = 1 OR is_read_later = 1",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Count a feed's articles published at or after `since`.
    pub async fn count_published_since(&self, feed_id: i64, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE feed_id = $1 AND published_at >= $2",
        )
        .bind(feed_id)
        .bind(since)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Set the read flag.
    pub async fn set_read(&self, id: i64, is_read: bool) -> Result<bool> {
        self.set_flag("is_read", id, is_read).await
    }

    /// Set the favorite flag.
    pub async fn set_favorite(&self, id: i64, is_favorite: bool) -> Result<bool> {
        self.set_flag("is_favorite", id, is_favorite).await
    }

    /// Set the read-later flag.
    pub async fn set_read_later(&self, id: i64, is_read_later: bool) -> Result<bool> {
        self.set_flag("is_read_later", id, is_read_later).await
    }

    async fn set_flag(&self, column: &'static str, id: i64, value: bool) -> Result<bool> {
        let query = format!("UPDATE articles SET {column} = $1 WHERE id = $2");
        let result = sqlx::query(&query)
            .bind(value)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete unprotected articles published before `cutoff`.
    pub async fn delete_published_before(
        &self,
        cutoff: DateTime<Utc>,
        filter: ReadFilter,
    ) -> Result<u64> {
        let query = format!(
            "DELETE FROM articles WHERE published_at < $1 AND {} AND {}",
            UNPROTECTED,
            filter.sql()
        );
        let result = sqlx::query(&query)
            .bind(cutoff)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete up to `limit` of the oldest-published unprotected articles.
    pub async fn delete_oldest(&self, filter: ReadFilter, limit: i64) -> Result<u64> {
        let query = format!(
            r#"
            DELETE FROM articles
            WHERE id IN (
                SELECT id FROM articles
                WHERE {} AND {}
                ORDER BY published_at ASC, id ASC
                LIMIT $1
            )
            "#,
            UNPROTECTED,
            filter.sql()
        );
        let result = sqlx::query(&query)
            .bind(limit)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
