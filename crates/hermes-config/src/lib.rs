//! Typed configuration for Hermes.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Configuration File Format
//!
//! ```toml
//! [runtime]
//! force = "deno"
//!
//! [bridge]
//! timeout_ms = 30000
//!
//! [native]
//! library_path = "./target/release/libhermes_ffi.so"
//! symbol_prefix = "hermes"
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `HERMES__RUNTIME__FORCE=bun`
//! - `HERMES__BRIDGE__TIMEOUT_MS=5000`
//! - `HERMES__NATIVE__LIBRARY_PATH=/usr/lib/libhermes_ffi.so`
//! - `HERMES__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::HermesConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
