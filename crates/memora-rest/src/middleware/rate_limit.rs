//! Per-client rate limiting middleware.

use crate::error::AppError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota};
use memora_cache::{CacheHandle, Ttl};
use memora_config::{RateLimitBackend, RateLimitConfig};
use memora_core::{MemoraError, MemoraResult};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

#[derive(Clone)]
enum Backend {
    Memory(Arc<DefaultKeyedRateLimiter<String>>),
    Store(CacheHandle),
}

/// Rate limiter keyed by client address.
///
/// The memory backend keeps a token bucket per client in this process.
/// The store backend counts requests per fixed window in the cache store so
/// every instance shares the same budget; if the store cannot be reached
/// in time the request is let through.
///
/// Clients are keyed on the peer address unless forwarded headers are
/// explicitly trusted.
#[derive(Clone)]
pub struct RateLimiter {
    backend: Backend,
    max_requests: u32,
    window_secs: u64,
    trust_forwarded_headers: bool,
}

impl RateLimiter {
    /// Creates a process-local limiter.
    pub fn memory(max_requests: u32, window_secs: u64) -> MemoraResult<Self> {
        let burst = NonZeroU32::new(max_requests)
            .ok_or_else(|| MemoraError::Configuration("max_requests must be positive".to_string()))?;
        let period = std::time::Duration::from_secs(window_secs) / burst.get();
        let quota = Quota::with_period(period)
            .ok_or_else(|| MemoraError::Configuration("rate limit window is too short".to_string()))?
            .allow_burst(burst);

        Ok(Self {
            backend: Backend::Memory(Arc::new(DefaultKeyedRateLimiter::keyed(quota))),
            max_requests,
            window_secs,
            trust_forwarded_headers: false,
        })
    }

    /// Creates a limiter counting in the cache store behind `handle`.
    #[must_use]
    pub fn store(handle: CacheHandle, max_requests: u32, window_secs: u64) -> Self {
        Self {
            backend: Backend::Store(handle),
            max_requests,
            window_secs: window_secs.max(1),
            trust_forwarded_headers: false,
        }
    }

    /// Key clients on `X-Forwarded-For` / `X-Real-IP` when present.
    #[must_use]
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    /// Builds the configured limiter, or `None` when rate limiting is off.
    pub fn from_config(config: &RateLimitConfig, handle: CacheHandle) -> MemoraResult<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let limiter = match config.backend {
            RateLimitBackend::Memory => Self::memory(config.max_requests, config.window_secs)?,
            RateLimitBackend::Store => Self::store(handle, config.max_requests, config.window_secs),
        };
        Ok(Some(limiter.trust_forwarded_headers(config.trust_forwarded_headers)))
    }

    /// Window length in seconds.
    #[must_use]
    pub const fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Record one request from `client`.
    ///
    /// Returns `RateLimitExceeded` once the client is over its budget.
    pub async fn check(&self, client: &str) -> MemoraResult<()> {
        match &self.backend {
            Backend::Memory(limiter) => limiter
                .check_key(&client.to_owned())
                .map_err(|_| MemoraError::RateLimitExceeded),
            Backend::Store(handle) => self.check_store(handle, client).await,
        }
    }

    async fn check_store(&self, handle: &CacheHandle, client: &str) -> MemoraResult<()> {
        let Some(store) = handle.store() else {
            debug!("Cache not initialized, skipping rate limit for {}", client);
            return Ok(());
        };

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let key = format!("ratelimit:{}:{}", client, now / self.window_secs);

        let incr = store.incr_window(&key, Ttl::from_secs(self.window_secs));
        match handle.timed("rate_limit", incr).await {
            Ok(count) if count > u64::from(self.max_requests) => Err(MemoraError::RateLimitExceeded),
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(client, error = %e, "Rate limit store unavailable, allowing request");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            Backend::Memory(_) => "memory",
            Backend::Store(_) => "store",
        };
        f.debug_struct("RateLimiter")
            .field("backend", &backend)
            .field("max_requests", &self.max_requests)
            .field("window_secs", &self.window_secs)
            .field("trust_forwarded_headers", &self.trust_forwarded_headers)
            .finish()
    }
}

/// Identifies the caller by peer address.
///
/// With `trust_forwarded` the first `X-Forwarded-For` hop, then
/// `X-Real-IP`, take precedence. Without a peer address the caller is
/// `"unknown"`.
pub fn client_id(request: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let headers = request.headers();

        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

/// Rejects requests over the client's budget with `429 Too Many Requests`.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_id(&request, limiter.trust_forwarded_headers);

    if let Err(err) = limiter.check(&client).await {
        warn!(client = %client, "Rate limit exceeded");
        let mut response = AppError(err).into_response();
        if let Ok(retry_after) = HeaderValue::from_str(&limiter.window_secs().to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, retry_after);
        }
        return response;
    }

    next.run(request).await
}
