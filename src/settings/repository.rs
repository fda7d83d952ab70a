//! Key/value settings repository.

use std::collections::HashMap;

use crate::db::DbPool;
use crate::Result;

/// Repository for runtime settings.
pub struct SettingsRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get a setting value.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool)
            .await?;
        Ok(value)
    }

    /// Insert or replace a setting value.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Read every setting in one query.
    pub async fn get_all(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_get_missing() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = SettingsRepository::new(db.pool());
        assert!(repo.get("refresh_mode").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_and_overwrite() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = SettingsRepository::new(db.pool());

        repo.set("update_interval", "30").await.unwrap();
        repo.set("update_interval", "45").await.unwrap();

        assert_eq!(
            repo.get("update_interval").await.unwrap().as_deref(),
            Some("45")
        );
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
    }
}
