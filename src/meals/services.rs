use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{error, info};

use super::prompt::build_prompt;
use crate::{
    auth::jwt::AuthUser,
    history::{repo_types::NewHistoryEntry, HistorySink},
    nutrition::{
        accumulator::{DailySummary, SessionEnded, SessionStore},
        analyze_report,
        record::NutritionRecord,
    },
    vision::{ReportAnalyzer, VisionError},
};

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

pub struct AnalysisOutcome {
    pub record: NutritionRecord,
    pub history_id: i64,
    pub daily: DailySummary,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error("history store unavailable: {0}")]
    History(anyhow::Error),
    #[error(transparent)]
    Session(#[from] SessionEnded),
}

pub fn is_supported_image(content_type: &str) -> bool {
    matches!(
        content_type,
        "image/jpeg" | "image/jpg" | "image/png" | "image/webp"
    )
}

/// Photo in, record out: ask the vision service for a report, then record it.
/// Nothing is stored or counted when the vision call fails.
pub async fn analyze_image(
    analyzer: &dyn ReportAnalyzer,
    history: &dyn HistorySink,
    sessions: &SessionStore,
    auth: AuthUser,
    image: UploadItem,
    quantity: &str,
    daily_limit: Option<u32>,
) -> Result<AnalysisOutcome, AnalyzeError> {
    sessions.check(auth.session_id).await?;
    let prompt = build_prompt(quantity);
    let report = analyzer
        .analyze(&prompt, image.body, &image.content_type)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %auth.user_id, "vision analysis failed");
            e
        })?;

    record_report(history, sessions, auth, &report, quantity, daily_limit).await
}

/// Parse a report and commit it: the history row first, then the session
/// total. A failed insert leaves the session total untouched, and a closed
/// session gets neither.
pub async fn record_report(
    history: &dyn HistorySink,
    sessions: &SessionStore,
    auth: AuthUser,
    report: &str,
    quantity: &str,
    daily_limit: Option<u32>,
) -> Result<AnalysisOutcome, AnalyzeError> {
    sessions.check(auth.session_id).await?;
    let record = analyze_report(report, quantity, auth.user_id, OffsetDateTime::now_utc());

    let entry = history
        .append(NewHistoryEntry::from(&record))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %auth.user_id, "history append failed");
            AnalyzeError::History(e)
        })?;

    let daily = sessions
        .record(auth.session_id, daily_limit, &record)
        .await
        .map_err(|e| {
            // Logged out while the row was being written.
            error!(error = %e, history_id = entry.id, "session closed mid-analysis");
            e
        })?;

    info!(
        user_id = %auth.user_id,
        history_id = entry.id,
        meal = %record.meal_name,
        calories = ?record.total_calories,
        health = record.health_level.as_str(),
        "meal analysed"
    );

    Ok(AnalysisOutcome {
        record,
        history_id: entry.id,
        daily,
    })
}
