use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Nash Stash API is running",
    })
}

/// Mount health check routes (under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
