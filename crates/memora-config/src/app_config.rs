//! Application configuration structures.

use memora_core::telemetry::{LogFormat, TelemetryConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Cache store configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Cache administration endpoints.
    #[serde(default)]
    pub admin: AdminConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "memora".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Enable CORS.
    pub cors_enabled: bool,
    /// CORS allowed origins.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// Returns the server bind address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Networked Redis server.
    #[default]
    Redis,
    /// In-process map, for development and tests.
    Memory,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Cache store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the cache. When disabled no store is attached and every
    /// memoized call computes.
    pub enabled: bool,
    /// Store backend.
    pub backend: CacheBackend,
    /// Redis connection URL.
    pub url: String,
    /// TTL applied when a write does not carry its own, in seconds.
    pub default_ttl_secs: u64,
    /// Prefix prepended by the store to every key (may be empty).
    pub key_prefix: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Upper bound for a single store operation, in milliseconds.
    pub operation_timeout_ms: u64,
    /// Maximum number of entries kept by the memory backend.
    pub memory_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Redis,
            url: "redis://localhost:6379/0".to_string(),
            default_ttl_secs: 300,
            key_prefix: String::new(),
            pool_size: 10,
            operation_timeout_ms: 500,
            memory_max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// Returns the default TTL as a Duration.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Returns the per-operation timeout as a Duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Configuration for an in-memory store, handy in tests.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ..Self::default()
        }
    }
}

/// Where rate-limit counters live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    /// Per-process counters.
    #[default]
    Memory,
    /// Fixed-window counters in the cache store, shared by every instance.
    Store,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable the rate limiting middleware.
    pub enabled: bool,
    /// Counter backend.
    pub backend: RateLimitBackend,
    /// Requests allowed per client and window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Key clients on `X-Forwarded-For` / `X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that overwrites these headers.
    pub trust_forwarded_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: RateLimitBackend::Memory,
            max_requests: 60,
            window_secs: 60,
            trust_forwarded_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Returns the window as a Duration.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Cache administration configuration.
///
/// The admin routes are not mounted unless `enabled`; requests must then
/// carry `token` in the `X-Admin-Token` header.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the cache admin routes.
    pub enabled: bool,
    /// Shared secret expected in `X-Admin-Token`.
    pub token: String,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("enabled", &self.enabled)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record HTTP and cache metrics and serve them.
    pub enabled: bool,
    /// Route serving the Prometheus text format.
    pub path: String,
    /// Paths not recorded as HTTP traffic.
    pub exclude_paths: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
            exclude_paths: vec!["/metrics".to_string(), "/health".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: LogFormat,
    /// Prometheus metrics.
    pub metrics: MetricsConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics: MetricsConfig::default(),
        }
    }
}

impl ObservabilityConfig {
    /// Builds the tracing configuration for this application.
    #[must_use]
    pub fn telemetry(&self, app: &AppMetadata) -> TelemetryConfig {
        TelemetryConfig {
            service_name: app.name.clone(),
            log_level: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_defaults() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.backend, CacheBackend::Redis);
        assert_eq!(config.url, "redis://localhost:6379/0");
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.operation_timeout(), Duration::from_millis(500));
        assert!(config.key_prefix.is_empty());
    }

    #[test]
    fn test_memory_cache_config() {
        let config = CacheConfig::memory();
        assert_eq!(config.backend, CacheBackend::Memory);
        assert_eq!(config.backend.to_string(), "memory");
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"cache": {"key_prefix": "svc:"}}"#).unwrap();
        assert_eq!(config.cache.key_prefix, "svc:");
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert!(!config.rate_limit.enabled);
        assert!(!config.rate_limit.trust_forwarded_headers);
        assert!(!config.admin.enabled);
        assert!(config.observability.metrics.enabled);
    }

    #[test]
    fn test_admin_token_is_redacted() {
        let admin = AdminConfig {
            enabled: true,
            token: "s3cret".to_string(),
        };
        let debug = format!("{admin:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_metrics_defaults() {
        let metrics = MetricsConfig::default();
        assert_eq!(metrics.path, "/metrics");
        assert!(metrics.exclude_paths.contains(&"/health".to_string()));
    }

    #[test]
    fn test_telemetry_from_observability() {
        let app = AppMetadata::default();
        let observability = ObservabilityConfig {
            log_level: "debug".to_string(),
            log_format: LogFormat::Json,
            metrics: MetricsConfig::default(),
        };
        let telemetry = observability.telemetry(&app);
        assert_eq!(telemetry.service_name, "memora");
        assert_eq!(telemetry.format, LogFormat::Json);
    }
}
