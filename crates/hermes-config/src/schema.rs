//! Configuration sections.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtimes a configuration may force.
pub const KNOWN_RUNTIMES: [&str; 3] = ["node", "bun", "deno"];

/// Runtime selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Skip detection and use this runtime (`node`, `bun` or `deno`).
    #[serde(default)]
    pub force: Option<String>,
}

/// Callback bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// How long an engine thread waits for a callback, in milliseconds.
    /// Unset waits forever.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl BridgeConfig {
    /// The timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Native engine library settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NativeConfig {
    /// Shared library to load for the pointer-based adapter.
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Prefix of the exported symbols (`<prefix>_create`, ...).
    #[serde(default = "default_symbol_prefix")]
    pub symbol_prefix: String,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            symbol_prefix: default_symbol_prefix(),
        }
    }
}

fn default_symbol_prefix() -> String {
    "hermes".to_string()
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Install a global subscriber when the app is created.
    #[serde(default)]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
