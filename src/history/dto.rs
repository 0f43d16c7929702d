use serde::Serialize;
use time::OffsetDateTime;

use super::repo_types::HistoryEntry;

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub id: i64,
    pub meal_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub total_calories: Option<i32>,
    pub details: String,
}

impl From<HistoryEntry> for HistoryItem {
    fn from(e: HistoryEntry) -> Self {
        Self {
            id: e.id,
            meal_name: e.meal_name,
            created_at: e.created_at,
            total_calories: e.total_calories,
            details: e.raw_text,
        }
    }
}
