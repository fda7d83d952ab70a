//! Storage seam for the retention engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::article::{ArticleRepository, ReadFilter};
use crate::db::Database;
use crate::Result;

/// The operations the retention engine needs from article storage.
///
/// Every delete must skip favorite and read-later articles.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Current live size in megabytes.
    async fn size_mb(&self) -> Result<f64>;

    /// Delete unprotected articles published before `cutoff`.
    async fn delete_published_before(
        &self,
        cutoff: DateTime<Utc>,
        filter: ReadFilter,
    ) -> Result<u64>;

    /// Delete up to `limit` of the oldest-published unprotected articles.
    async fn delete_oldest(&self, filter: ReadFilter, limit: usize) -> Result<u64>;

    /// Reclaim space freed by deletions.
    async fn compact(&self) -> Result<()>;
}

#[async_trait]
impl ArticleStore for Database {
    async fn size_mb(&self) -> Result<f64> {
        Database::size_mb(self).await
    }

    async fn delete_published_before(
        &self,
        cutoff: DateTime<Utc>,
        filter: ReadFilter,
    ) -> Result<u64> {
        ArticleRepository::new(self.pool())
            .delete_published_before(cutoff, filter)
            .await
    }

    async fn delete_oldest(&self, filter: ReadFilter, limit: usize) -> Result<u64> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        ArticleRepository::new(self.pool())
            .delete_oldest(filter, limit)
            .await
    }

    async fn compact(&self) -> Result<()> {
        self.vacuum().await
    }
}
