use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;

use crate::{error::AppResult, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/seat-selection-rules", get(list_rules))
}

// GET /api/seat-selection-rules
async fn list_rules(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.rules.find_all().await?))
}
