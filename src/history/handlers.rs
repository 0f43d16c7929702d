use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{error, instrument};

use super::dto::HistoryItem;
use crate::{auth::jwt::AuthUser, state::AppState};

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/history", get(list_history))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn list_history(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<HistoryItem>>, (StatusCode, String)> {
    let rows = state
        .history
        .list_for_owner(auth.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, "list history failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "History unavailable".to_string())
        })?;
    Ok(Json(rows.into_iter().map(HistoryItem::from).collect()))
}
