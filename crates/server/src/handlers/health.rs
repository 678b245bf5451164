//! Health check handler.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use silo_core::api::HealthResponse;

/// GET /health - liveness probe with uptime.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime: state.uptime_secs(),
    })
}
