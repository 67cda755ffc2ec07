//! Cache administration controller.
//!
//! Mounted only when an admin token is configured; every request must
//! present it in the `X-Admin-Token` header.

use crate::{error::ApiResult, state::AppState};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::delete,
    Json, Router,
};
use memora_core::{MemoraError, MemoraResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Create the cache admin router.
pub fn router() -> Router<AppState> {
    Router::new().route("/cache", delete(clear_cache))
}

/// Query parameters for clearing the cache.
#[derive(Debug, Default, Deserialize)]
pub struct ClearParams {
    /// Only delete keys starting with this prefix.
    #[serde(default)]
    pub prefix: String,
}

/// Result of a clear operation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub prefix: String,
    pub deleted: u64,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> MemoraResult<()> {
    let expected = state
        .admin_token
        .as_deref()
        .ok_or_else(|| MemoraError::Unauthorized("cache administration is disabled".to_string()))?;

    let presented = headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if presented == Some(expected) {
        Ok(())
    } else {
        warn!("Rejected cache admin request with missing or invalid token");
        Err(MemoraError::Unauthorized("missing or invalid admin token".to_string()))
    }
}

/// Delete every cached entry under a prefix.
pub async fn clear_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ClearParams>,
) -> ApiResult<ClearResponse> {
    authorize(&state, &headers)?;

    if params.prefix.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(MemoraError::validation("prefix must not contain whitespace or control characters").into());
    }

    let deleted = state.cache.clear(&params.prefix).await?;
    info!("Admin cleared {} cache entries under '{}'", deleted, params.prefix);

    Ok(Json(ClearResponse {
        prefix: params.prefix,
        deleted,
    }))
}
