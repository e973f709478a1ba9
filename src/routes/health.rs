// Health check route
// Endpoint: GET /health

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::services::ServiceState;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub cache_enabled: bool,
    pub timezone: &'static str,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ready: state.service.state() == ServiceState::Ready,
        cache_enabled: state.service.is_cache_enabled(),
        timezone: state.config.timezone.name(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
