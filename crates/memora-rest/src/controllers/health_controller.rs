//! Health check controller.

use crate::{error::AppError, state::AppState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Application version.
    pub version: String,
    /// Cache status: `up`, `down` or `disabled`.
    pub cache: String,
}

/// Creates the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

async fn cache_status(state: &AppState) -> &'static str {
    if !state.cache.config().enabled {
        return "disabled";
    }
    match state.cache.health_check().await {
        Ok(()) => "up",
        Err(_) => "down",
    }
}

/// Health check endpoint. The service reports healthy even when the cache
/// is down, since memoized functions still compute.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: cache_status(&state).await.to_string(),
    })
}

/// Readiness check endpoint.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    if state.cache.config().enabled {
        state.cache.health_check().await?;
    }
    Ok(StatusCode::OK)
}

/// Liveness check endpoint.
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}
