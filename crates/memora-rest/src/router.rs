//! Main application router.

use crate::{
    controllers::{cache_controller, health_controller},
    cors::create_cors_layer,
    metrics::{http_metrics_middleware, metrics_handler, HttpMetrics},
    middleware::{logging_middleware, rate_limit_middleware},
    state::AppState,
};
use axum::{middleware, routing::get, Router};
use memora_config::AppConfig;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Creates the application router.
///
/// `api` holds the service's own routes and is mounted under `/api/v1`.
/// The cache admin routes join it only when the state carries an admin
/// token. Rate limiting applies to the API only; health checks are never
/// throttled.
pub fn create_router(state: AppState, api: Router<AppState>, config: &AppConfig) -> Router {
    let mut api_router = Router::new().merge(api);

    if state.admin_token.is_some() {
        info!("Cache admin routes enabled");
        api_router = api_router.merge(cache_controller::router());
    }

    if let Some(limiter) = state.rate_limiter.clone() {
        info!("Rate limiting enabled: {:?}", limiter);
        api_router = api_router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    let mut router = Router::new()
        .merge(health_controller::router())
        .nest("/api/v1", api_router)
        .route("/", get(root));

    if state.metrics.is_some() {
        let metrics = &config.observability.metrics;
        info!("Prometheus metrics served at {}", metrics.path);
        router = router
            .route(&metrics.path, get(metrics_handler))
            .route_layer(middleware::from_fn_with_state(
                HttpMetrics::new(&metrics.exclude_paths),
                http_metrics_middleware,
            ));
    }

    let router = router
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(create_cors_layer(&config.server))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(logging_middleware));

    info!("Router created");
    router
}

/// Root endpoint handler.
async fn root() -> &'static str {
    "Memora API v1"
}
