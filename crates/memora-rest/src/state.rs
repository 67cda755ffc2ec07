//! Application state for Axum handlers.

use crate::metrics::install_recorder;
use crate::middleware::RateLimiter;
use memora_cache::{CacheHandle, CacheManager};
use memora_config::AppConfig;
use memora_core::MemoraResult;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub rate_limiter: Option<RateLimiter>,
    /// Shared secret for the cache admin routes; `None` keeps them unmounted.
    pub admin_token: Option<Arc<str>>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Creates a new application state without admin routes or metrics.
    pub fn new(cache: Arc<CacheManager>, rate_limiter: Option<RateLimiter>) -> Self {
        Self {
            cache,
            rate_limiter,
            admin_token: None,
            metrics: None,
        }
    }

    /// Enables the cache admin routes behind `token`.
    #[must_use]
    pub fn with_admin_token(mut self, token: impl Into<Arc<str>>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Serves metrics rendered by `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Creates the state from configuration, sharing the manager's handle
    /// with the rate limiter.
    pub fn from_config(cache: Arc<CacheManager>, config: &AppConfig) -> MemoraResult<Self> {
        let rate_limiter = RateLimiter::from_config(&config.rate_limit, cache.handle())?;
        let mut state = Self::new(cache, rate_limiter);

        if config.admin.enabled {
            state = state.with_admin_token(config.admin.token.as_str());
        }
        if config.observability.metrics.enabled {
            state = state.with_metrics(install_recorder()?);
        }
        Ok(state)
    }

    /// Handle for memoized functions.
    pub fn cache_handle(&self) -> CacheHandle {
        self.cache.handle()
    }
}
