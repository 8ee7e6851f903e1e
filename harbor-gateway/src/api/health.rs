//! Health Check API Handlers
//!
//! Liveness endpoints for monitoring and load balancers.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /
/// Service status
pub async fn home() -> impl IntoResponse {
    Json(json!({ "Status": "Up" }))
}
