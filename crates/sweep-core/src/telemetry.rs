//! Log subscriber installation
//!
//! `RUST_LOG` takes precedence over [`SweepConfig::log_filter`].

use crate::config::SweepConfig;
use crate::error::ConfigError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `fmt` subscriber described by `config`
///
/// # Errors
/// Returns [`ConfigError::Telemetry`] if the filter is invalid or a global
/// subscriber is already installed.
pub fn init(config: &SweepConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)
            .map_err(|e| ConfigError::Telemetry(format!("invalid log filter '{}': {e}", config.log_filter)))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.log_json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| ConfigError::Telemetry(e.to_string()))?;

    tracing::debug!(json = config.log_json, "logging initialized");
    Ok(())
}
