use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::record::NutritionRecord;

/// One stored analysis. Rows are only ever inserted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryEntry {
    pub id: i64,                      // BIGSERIAL, assigned by the store
    pub user_id: Uuid,                // owner
    pub created_at: OffsetDateTime,   // analysis time
    pub meal_name: String,
    pub raw_text: String,             // full report, for audit
    pub total_calories: Option<i32>,
}

/// What the pipeline hands to the sink for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub meal_name: String,
    pub raw_text: String,
    pub total_calories: Option<i32>,
}

impl From<&NutritionRecord> for NewHistoryEntry {
    fn from(r: &NutritionRecord) -> Self {
        Self {
            user_id: r.owner,
            created_at: r.timestamp,
            meal_name: r.meal_name.clone(),
            raw_text: r.raw_text.clone(),
            // Extraction already drops numbers beyond i32, so this never loses a value.
            total_calories: r.total_calories.and_then(|c| i32::try_from(c).ok()),
        }
    }
}
