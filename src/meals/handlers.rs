use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::dto::{AnalysisResponse, AnalyzeReportRequest, SetLimitRequest};
use super::prompt::normalize_quantity;
use super::services::{
    analyze_image, is_supported_image, record_report, AnalysisOutcome, AnalyzeError, UploadItem,
};
use crate::{
    auth::jwt::AuthUser,
    nutrition::accumulator::{validate_limit, DailySummary, SessionEnded},
    state::AppState,
};

// --- public routers ---

pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/meals/analyze", post(analyze_upload)) // multipart: image, quantity, daily_limit
        .route("/meals/analyze/report", post(analyze_report_text))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

pub fn daily_routes() -> Router<AppState> {
    Router::new()
        .route("/daily", get(get_daily))
        .route("/daily/limit", put(set_daily_limit))
}

// --- handlers ---

#[instrument(skip(state, auth, mp), fields(user_id = %auth.user_id))]
pub async fn analyze_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    mut mp: Multipart,
) -> Result<Json<AnalysisResponse>, (StatusCode, String)> {
    let mut image: Option<UploadItem> = None;
    let mut quantity: Option<String> = None;
    let mut daily_limit: Option<u32> = None;

    while let Some(field) = mp.next_field().await.map_err(bad_request)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("image") | Some("file") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(bad_request)?;
                image = Some(UploadItem { body, content_type });
            }
            Some("quantity") => quantity = Some(field.text().await.map_err(bad_request)?),
            Some("daily_limit") => {
                let raw = field.text().await.map_err(bad_request)?;
                let limit = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| (StatusCode::BAD_REQUEST, "daily_limit must be a number".to_string()))?;
                daily_limit = Some(limit);
            }
            _ => {}
        }
    }

    let Some(image) = image else {
        return Err((StatusCode::BAD_REQUEST, "image is required".into()));
    };
    if image.body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "image is empty".into()));
    }
    if !is_supported_image(&image.content_type) {
        warn!(content_type = %image.content_type, "unsupported image type");
        return Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "image must be jpeg, png or webp".into(),
        ));
    }
    let daily_limit = check_limit(daily_limit)?;
    let quantity = normalize_quantity(quantity.as_deref());

    let outcome = analyze_image(
        state.analyzer.as_ref(),
        state.history.as_ref(),
        &state.sessions,
        auth,
        image,
        &quantity,
        daily_limit,
    )
    .await
    .map_err(analyze_failed)?;

    Ok(Json(respond(outcome)))
}

#[instrument(skip(state, auth, body), fields(user_id = %auth.user_id))]
pub async fn analyze_report_text(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AnalyzeReportRequest>,
) -> Result<Json<AnalysisResponse>, (StatusCode, String)> {
    if body.report_text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "report_text is required".into()));
    }
    let daily_limit = check_limit(body.daily_limit)?;
    let quantity = normalize_quantity(body.quantity.as_deref());

    let outcome = record_report(
        state.history.as_ref(),
        &state.sessions,
        auth,
        &body.report_text,
        &quantity,
        daily_limit,
    )
    .await
    .map_err(analyze_failed)?;

    Ok(Json(respond(outcome)))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn get_daily(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<DailySummary>, (StatusCode, String)> {
    let daily = state
        .sessions
        .summary(auth.session_id)
        .await
        .map_err(session_ended)?;
    Ok(Json(daily))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn set_daily_limit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SetLimitRequest>,
) -> Result<Json<DailySummary>, (StatusCode, String)> {
    let limit = validate_limit(body.daily_limit).map_err(bad_request)?;
    let daily = state
        .sessions
        .set_limit(auth.session_id, limit)
        .await
        .map_err(session_ended)?;
    Ok(Json(daily))
}

fn respond(outcome: AnalysisOutcome) -> AnalysisResponse {
    let macro_distribution = outcome.record.macros.distribution();
    AnalysisResponse {
        record: outcome.record,
        history_id: outcome.history_id,
        daily: outcome.daily,
        macro_distribution,
    }
}

fn check_limit(limit: Option<u32>) -> Result<Option<u32>, (StatusCode, String)> {
    limit.map(validate_limit).transpose().map_err(bad_request)
}

fn analyze_failed(e: AnalyzeError) -> (StatusCode, String) {
    match e {
        AnalyzeError::Vision(_) => (
            StatusCode::BAD_GATEWAY,
            "Analysis service unavailable".into(),
        ),
        AnalyzeError::History(e) => {
            error!(error = %e, "analysis not saved");
            (StatusCode::INTERNAL_SERVER_ERROR, "History unavailable".into())
        }
        AnalyzeError::Session(e) => session_ended(e),
    }
}

fn session_ended(e: SessionEnded) -> (StatusCode, String) {
    warn!(error = %e, "token for a closed session");
    (StatusCode::UNAUTHORIZED, "Session has ended".into())
}

fn bad_request<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
