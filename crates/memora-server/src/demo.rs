//! Demo routes backed by a memoized computation.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use memora_cache::{function_id, CacheHandle, Memoized, Ttl};
use memora_core::MemoraError;
use memora_rest::{ApiResult, AppState};
use serde::{Deserialize, Serialize};
use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;

/// Largest input whose Fibonacci number fits in a `u64`.
pub const MAX_FIB_INPUT: u64 = 93;

/// Simulated cost of one uncached computation.
const COMPUTE_DELAY: Duration = Duration::from_millis(200);

/// A computed Fibonacci number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fibonacci {
    pub n: u64,
    pub value: u64,
}

/// Result of an invalidation request.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub removed: bool,
}

/// Create the demo router.
pub fn router() -> Router<AppState> {
    Router::new().route("/demo/fib/:n", get(get_fibonacci).delete(invalidate_fibonacci))
}

/// Slow Fibonacci, memoized for ten minutes under the `fib:` prefix.
pub fn fibonacci(
    handle: CacheHandle,
) -> Memoized<impl Fn((u64,)) -> BoxFuture<'static, Result<Fibonacci, MemoraError>>> {
    Memoized::new(function_id!("fibonacci"), handle, |(n,): (u64,)| compute(n).boxed())
        .with_prefix("fib:")
        .with_ttl(Ttl::from_secs(600))
}

async fn compute(n: u64) -> Result<Fibonacci, MemoraError> {
    if n > MAX_FIB_INPUT {
        return Err(MemoraError::validation(format!("n must be at most {}", MAX_FIB_INPUT)));
    }

    tokio::time::sleep(COMPUTE_DELAY).await;

    let (mut a, mut b) = (0_u64, 1_u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    Ok(Fibonacci { n, value: a })
}

async fn get_fibonacci(State(state): State<AppState>, Path(n): Path<u64>) -> ApiResult<Fibonacci> {
    let result = fibonacci(state.cache_handle()).call((n,)).await?;
    Ok(Json(result))
}

async fn invalidate_fibonacci(
    State(state): State<AppState>,
    Path(n): Path<u64>,
) -> ApiResult<InvalidateResponse> {
    let removed = fibonacci(state.cache_handle()).invalidate(&(n,)).await?;
    Ok(Json(InvalidateResponse { removed }))
}
