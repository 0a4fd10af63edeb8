use axum::Json;
use tracing::debug;

use crate::db::store;
use crate::models::HealthResponse;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check() -> Json<HealthResponse> {
    debug!("Readiness check requested");
    let message = if store::get_db().is_some() {
        "Service is ready".to_string()
    } else {
        "Service is ready (in-memory mode, no store configured)".to_string()
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        message,
    })
}
