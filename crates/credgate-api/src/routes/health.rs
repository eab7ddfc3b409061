//! Health check endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

use super::management::MessageResponse;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /
async fn welcome() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to the API!"))
}

/// Health check handler
async fn health() -> Json<HealthResponse> {
    metrics::counter!("credgate_health_checks_total").increment(1);

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route("/healthz", get(health))
}
