//! Logging for Hermes.
//!
//! Every Hermes crate logs through `tracing`. This crate installs the global
//! subscriber: an `EnvFilter` plus a JSON or pretty `fmt` layer.
//!
//! ```rust,ignore
//! use hermes_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(route = "GET /hello", "route registered");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
