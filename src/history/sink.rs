use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{HistoryEntry, NewHistoryEntry};

/// Durable, append-only log of analyses.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, entry: NewHistoryEntry) -> anyhow::Result<HistoryEntry>;
    /// All entries of `user_id`, most recent first.
    async fn list_for_owner(&self, user_id: Uuid) -> anyhow::Result<Vec<HistoryEntry>>;
}

#[derive(Clone)]
pub struct PgHistory {
    db: PgPool,
}

impl PgHistory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistorySink for PgHistory {
    async fn append(&self, entry: NewHistoryEntry) -> anyhow::Result<HistoryEntry> {
        let row = sqlx::query_as::<_, HistoryEntry>(
            r#"
            INSERT INTO history (user_id, created_at, meal_name, raw_text, total_calories)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, created_at, meal_name, raw_text, total_calories
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.created_at)
        .bind(&entry.meal_name)
        .bind(&entry.raw_text)
        .bind(entry.total_calories)
        .fetch_one(&self.db)
        .await
        .context("insert history entry")?;
        Ok(row)
    }

    async fn list_for_owner(&self, user_id: Uuid) -> anyhow::Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT id, user_id, created_at, meal_name, raw_text, total_calories
              FROM history
             WHERE user_id = $1
             ORDER BY id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list history by user")?;
        Ok(rows)
    }
}

#[cfg(test)]
pub use memory::MemoryHistory;
