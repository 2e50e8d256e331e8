//! Main configuration type.

use serde::{Deserialize, Serialize};

use crate::{BridgeConfig, ConfigError, LoggingConfig, NativeConfig, RuntimeConfig, KNOWN_RUNTIMES};

/// Complete Hermes configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use hermes_config::HermesConfig;
///
/// let config = HermesConfig::default();
/// assert_eq!(config.native.symbol_prefix, "hermes");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// Runtime selection.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Callback bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Native library settings.
    #[serde(default)]
    pub native: NativeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HermesConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `runtime.force` names an unknown runtime
    /// - `bridge.timeout_ms` is zero
    /// - `native.symbol_prefix` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(force) = &self.runtime.force {
            if !KNOWN_RUNTIMES.contains(&force.to_lowercase().as_str()) {
                return Err(ConfigError::invalid_value(
                    "runtime.force",
                    format!("expected one of node, bun, deno; got '{force}'"),
                ));
            }
        }

        if self.bridge.timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "bridge.timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.native.symbol_prefix.is_empty() {
            return Err(ConfigError::invalid_value(
                "native.symbol_prefix",
                "must not be empty",
            ));
        }

        Ok(())
    }
}
