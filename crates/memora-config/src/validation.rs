//! Configuration validation module.
//!
//! Collects every problem in one pass so a misconfigured deployment fails
//! at startup with the full list.

use crate::{AppConfig, CacheBackend};
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Port number is invalid (must be 1-65535).
    InvalidPort { name: String, value: u16 },
    /// Pool size is zero or above the maximum allowed.
    InvalidPoolSize { value: u32, maximum: u32 },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Key prefix contains characters the store cannot take.
    InvalidKeyPrefix { value: String },
    /// Duration or size value must be positive.
    NonPositiveValue { name: String },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Required value is missing.
    MissingValue { name: String },
    /// Route path does not start with `/`.
    InvalidPath { name: String, value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPort { name, value } => {
                write!(f, "Invalid port for {}: {} (must be 1-65535)", name, value)
            }
            Self::InvalidPoolSize { value, maximum } => {
                write!(f, "Invalid pool size {} (must be 1-{})", value, maximum)
            }
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::InvalidKeyPrefix { value } => {
                write!(
                    f,
                    "Invalid cache key prefix {:?}: whitespace and control characters are not allowed",
                    value
                )
            }
            Self::NonPositiveValue { name } => {
                write!(f, "'{}' must be positive", name)
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
            Self::MissingValue { name } => {
                write!(f, "'{}' is required", name)
            }
            Self::InvalidPath { name, value } => {
                write!(f, "Invalid path for {}: '{}' (must start with '/')", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: u32 = 1000;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&config.server, &mut errors);
        Self::validate_cache(&config.cache, &mut errors);
        Self::validate_rate_limit(&config.rate_limit, &mut errors);
        Self::validate_admin(&config.admin, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Checks that a key prefix is safe to put in front of store keys.
    #[must_use]
    pub fn is_valid_key_prefix(prefix: &str) -> bool {
        !prefix.chars().any(|c| c.is_whitespace() || c.is_control())
    }

    fn validate_server(config: &crate::ServerConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.port == 0 {
            errors.push(ConfigValidationError::InvalidPort {
                name: "server.port".to_string(),
                value: config.port,
            });
        }
        if config.request_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveValue {
                name: "server.request_timeout_secs".to_string(),
            });
        }
    }

    fn validate_cache(config: &crate::CacheConfig, errors: &mut Vec<ConfigValidationError>) {
        if !config.enabled {
            return;
        }

        if config.default_ttl_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveValue {
                name: "cache.default_ttl_secs".to_string(),
            });
        }
        if config.operation_timeout_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveValue {
                name: "cache.operation_timeout_ms".to_string(),
            });
        }
        if !Self::is_valid_key_prefix(&config.key_prefix) {
            errors.push(ConfigValidationError::InvalidKeyPrefix {
                value: config.key_prefix.clone(),
            });
        }

        match config.backend {
            CacheBackend::Redis => {
                if !config.url.starts_with("redis://") && !config.url.starts_with("rediss://") {
                    errors.push(ConfigValidationError::InvalidUrl {
                        url_type: "cache".to_string(),
                        message: "URL must start with redis:// or rediss://".to_string(),
                    });
                } else if let Err(e) = Url::parse(&config.url) {
                    errors.push(ConfigValidationError::InvalidUrl {
                        url_type: "cache".to_string(),
                        message: e.to_string(),
                    });
                }

                if config.pool_size == 0 || config.pool_size > Self::MAX_POOL_SIZE {
                    errors.push(ConfigValidationError::InvalidPoolSize {
                        value: config.pool_size,
                        maximum: Self::MAX_POOL_SIZE,
                    });
                }
            }
            CacheBackend::Memory => {
                if config.memory_max_entries == 0 {
                    errors.push(ConfigValidationError::NonPositiveValue {
                        name: "cache.memory_max_entries".to_string(),
                    });
                }
            }
        }
    }

    fn validate_rate_limit(config: &crate::RateLimitConfig, errors: &mut Vec<ConfigValidationError>) {
        if !config.enabled {
            return;
        }

        if config.max_requests == 0 {
            errors.push(ConfigValidationError::NonPositiveValue {
                name: "rate_limit.max_requests".to_string(),
            });
        }
        if config.window_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveValue {
                name: "rate_limit.window_secs".to_string(),
            });
        }
    }

    fn validate_admin(config: &crate::AdminConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.enabled && config.token.trim().is_empty() {
            errors.push(ConfigValidationError::MissingValue {
                name: "admin.token".to_string(),
            });
        }
    }

    fn validate_observability(
        config: &crate::ObservabilityConfig,
        errors: &mut Vec<ConfigValidationError>,
    ) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }
        if config.metrics.enabled && !config.metrics.path.starts_with('/') {
            errors.push(ConfigValidationError::InvalidPath {
                name: "observability.metrics.path".to_string(),
                value: config.metrics.path.clone(),
            });
        }
    }
}

/// Formats validation errors for display.
#[must_use]
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, error) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, error));
    }
    output
}
