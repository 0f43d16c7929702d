mod dto;
pub mod handlers;
pub mod repo_types;
pub mod sink;

use crate::state::AppState;
use axum::Router;

pub use sink::{HistorySink, PgHistory};

pub fn router() -> Router<AppState> {
    handlers::history_routes()
}
