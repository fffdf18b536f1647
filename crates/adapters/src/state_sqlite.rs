//! SQLite history log implementation

use async_trait::async_trait;
use post_batcher_domain::{HistoryError, HistoryLog, PublishedRecord};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

/// SQLite-backed history log
pub struct SqliteHistoryLog {
    pool: SqlitePool,
}

impl SqliteHistoryLog {
    /// Open (or create) the history database
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let log = Self { pool };
        log.run_migrations().await?;

        Ok(log)
    }

    /// Create an in-memory SQLite log (for testing)
    pub async fn in_memory() -> Result<Self, HistoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let log = Self { pool };
        log.run_migrations().await?;

        Ok(log)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS published_posts (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                text TEXT NOT NULL,
                published_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_published_text ON published_posts(text)")
            .execute(&self.pool)
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl HistoryLog for SqliteHistoryLog {
    async fn load_seen(&self) -> Result<HashSet<String>, HistoryError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT text FROM published_posts")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(text,)| text).collect())
    }

    async fn record_published(&self, record: &PublishedRecord) -> Result<(), HistoryError> {
        let published_at = record
            .published_at
            .format(&Rfc3339)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO published_posts (id, post_id, platform, text, published_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.post_id)
        .bind(&record.platform)
        .bind(&record.text)
        .bind(&published_at)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(())
    }
}
