//! Tracing subscriber initialization.
//!
//! Library crates only emit `tracing` events; binaries call
//! [`init_tracing`] once at startup to install a subscriber.

#[cfg(feature = "telemetry")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::MemoraResult;
use serde::{Deserialize, Serialize};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,memora=debug,tower_http=debug";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one event per line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Base level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_service_name() -> String {
    "memora".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl TelemetryConfig {
    /// Builds the filter directive used when `RUST_LOG` is absent.
    #[must_use]
    pub fn filter_directive(&self) -> String {
        if self.log_level.eq_ignore_ascii_case("info") {
            DEFAULT_FILTER.to_string()
        } else {
            format!("{},memora=debug,tower_http=debug", self.log_level.to_lowercase())
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Calling this more than once is harmless: later calls keep the first
/// subscriber and return `Ok(())`.
#[cfg(feature = "telemetry")]
pub fn init_tracing(config: &TelemetryConfig) -> MemoraResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let installed = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            service_name = %config.service_name,
            format = ?config.format,
            "Tracing initialized"
        );
    }

    Ok(())
}

/// Placeholder for when the telemetry feature is disabled.
#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_config: &TelemetryConfig) -> MemoraResult<()> {
    Ok(())
}
