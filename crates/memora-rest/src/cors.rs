//! CORS layer built from server settings.

use axum::http::HeaderValue;
use memora_config::ServerConfig;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Creates a CORS layer based on server configuration.
///
/// A `*` entry allows every origin. Otherwise only the listed origins are
/// allowed; entries that are not valid header values are skipped.
pub fn create_cors_layer(server_config: &ServerConfig) -> CorsLayer {
    if !server_config.cors_enabled {
        return CorsLayer::new();
    }

    if server_config.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = server_config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
