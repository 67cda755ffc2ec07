//! Application assembly and lifecycle.

use crate::demo;
use axum::Router;
use memora_cache::CacheManager;
use memora_config::AppConfig;
use memora_core::{MemoraError, MemoraResult};
use memora_rest::{create_router, AppState};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// A configured application with its cache connected.
pub struct App {
    config: AppConfig,
    cache: Arc<CacheManager>,
}

impl App {
    /// Connects the cache and prepares the application.
    ///
    /// Fails if the configured cache backend cannot be reached.
    pub async fn build(config: AppConfig) -> MemoraResult<Self> {
        let cache = Arc::new(CacheManager::new(config.cache.clone()));
        cache.init().await?;
        Ok(Self { config, cache })
    }

    /// Cache manager shared with the handlers.
    pub fn cache(&self) -> Arc<CacheManager> {
        Arc::clone(&self.cache)
    }

    /// Builds the HTTP router.
    pub fn router(&self) -> MemoraResult<Router> {
        let state = AppState::from_config(self.cache(), &self.config)?;
        Ok(create_router(state, demo::router(), &self.config))
    }

    /// Serves until `shutdown` resolves, then releases the cache.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> MemoraResult<()> {
        let router = self.router()?;
        let addr = self.config.server.addr();

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| MemoraError::internal(format!("Failed to bind {}: {}", addr, e)))?;
        info!("Listening on http://{}", addr);

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MemoraError::internal(format!("Server error: {}", e)));

        self.cache.shutdown().await;
        info!("Server shutdown complete");
        served
    }
}
