//! Server startup utilities.

use memora_config::AppConfig;
use tracing::info;

/// Prints server startup information.
pub fn print_startup_info(config: &AppConfig) {
    let separator = "=".repeat(60);
    let addr = config.server.addr();
    info!("{}", separator);
    info!("REST API:  http://{}/api/v1", addr);
    info!("Health:    http://{}/health", addr);
    info!("Demo:      http://{}/api/v1/demo/fib/40", addr);
    if config.observability.metrics.enabled {
        info!("Metrics:   http://{}{}", addr, config.observability.metrics.path);
    }
    info!(
        "Admin:     {}",
        if config.admin.enabled { "DELETE /api/v1/cache (token required)" } else { "disabled" }
    );
    info!(
        "Cache:     {} ({})",
        if config.cache.enabled { "enabled" } else { "disabled" },
        config.cache.backend
    );
    info!(
        "Rate limit: {}",
        if config.rate_limit.enabled {
            format!(
                "{} requests / {}s per client",
                config.rate_limit.max_requests, config.rate_limit.window_secs
            )
        } else {
            "disabled".to_string()
        }
    );
    info!("{}", separator);
}
