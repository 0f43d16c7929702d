mod dto;
pub mod handlers;
pub mod prompt;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::analyze_routes())
        .merge(handlers::daily_routes())
}
