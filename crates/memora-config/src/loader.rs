//! Configuration loader with layered sources.

use crate::{format_validation_errors, AppConfig, ConfigValidator};
use config::{Config, ConfigError, Environment, File};
use memora_core::MemoraError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Prefix of environment variable overrides (`MEMORA__CACHE__URL`).
pub const ENV_PREFIX: &str = "MEMORA";

/// Configuration loader with runtime reload support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from these sources, later ones winning:
    /// 1. `{config_dir}/default.toml`
    /// 2. `{config_dir}/{environment}.toml`
    /// 3. `{config_dir}/local.toml`
    /// 4. Environment variables with the `MEMORA` prefix and `__` separator
    pub fn new(config_dir: impl Into<String>) -> Result<Self, MemoraError> {
        let config_dir = config_dir.into();
        let config = Self::load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, MemoraError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk.
    ///
    /// The previous configuration stays in place if the new one fails to
    /// load or validate.
    pub async fn reload(&self) -> Result<(), MemoraError> {
        let new_config = Self::load_config(&self.config_dir)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Loads configuration from the specified directory.
    fn load_config(config_dir: &str) -> Result<AppConfig, MemoraError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("MEMORA_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_memora_error)?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_memora_error)?;
        app_config.app.environment = environment;

        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration, failing on the first load rather than
    /// at the first cache call.
    fn validate_config(config: &AppConfig) -> Result<(), MemoraError> {
        if config.app.environment == "production" && config.cache.key_prefix.is_empty() {
            warn!("Cache key prefix is empty in production; keys share the store namespace");
        }

        ConfigValidator::validate(config)
            .map_err(|errors| MemoraError::Configuration(format_validation_errors(&errors)))
    }

    /// Gets a specific configuration value by dotted key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn config_error_to_memora_error(err: ConfigError) -> MemoraError {
    MemoraError::Configuration(err.to_string())
}
