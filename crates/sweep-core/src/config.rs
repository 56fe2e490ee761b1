//! Engine and logging configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! default_mode = "within_run"
//! strict_clone = false
//! child_wait_timeout_ms = 30000
//! log_filter = "sweep_core=debug"
//! log_json = false
//! result_group = "Sweep"
//! ```

use crate::clone::ValueCloner;
use crate::error::ConfigError;
use crate::registry::TypeRegistry;
use crate::sweep::SweepMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Sweep configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Mode given to newly created parameter sweeps
    pub default_mode: SweepMode,
    /// Fail instead of sharing values that cannot be copied
    pub strict_clone: bool,
    /// Upper bound on waiting for each child run
    pub child_wait_timeout_ms: Option<u64>,
    /// Filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Display group of result parameters
    pub result_group: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            default_mode: SweepMode::WithinRun,
            strict_clone: false,
            child_wait_timeout_ms: None,
            log_filter: "info".to_string(),
            log_json: false,
            result_group: "Sweep".to_string(),
        }
    }
}

impl SweepConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    #[inline]
    #[must_use]
    pub fn with_default_mode(mut self, mode: SweepMode) -> Self {
        self.default_mode = mode;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_strict_clone(mut self, strict: bool) -> Self {
        self.strict_clone = strict;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_child_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.child_wait_timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_log_json(mut self, json: bool) -> Self {
        self.log_json = json;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_result_group(mut self, group: impl Into<String>) -> Self {
        self.result_group = group.into();
        self
    }

    /// Per-child wait timeout
    #[must_use]
    pub fn child_wait_timeout(&self) -> Option<Duration> {
        self.child_wait_timeout_ms.map(Duration::from_millis)
    }

    /// Value cloner honouring `strict_clone`
    #[must_use]
    pub fn cloner(&self, registry: Arc<TypeRegistry>) -> ValueCloner {
        ValueCloner::new(registry).with_strict(self.strict_clone)
    }
}
