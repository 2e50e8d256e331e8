//! FFI error handling

use hermes_core::HermesError;
use thiserror::Error;

/// Internal error type for FFI operations
#[derive(Error, Debug)]
pub enum FfiError {
    /// A required pointer argument was null.
    #[error("Null pointer provided for: {0}")]
    NullPointer(&'static str),

    /// The shared library could not be loaded.
    #[error("Failed to load library {path}: {message}")]
    LibraryLoad {
        /// Path that was attempted.
        path: String,
        /// Loader message.
        message: String,
    },

    /// The library does not export a required symbol.
    #[error("Missing symbol: {0}")]
    MissingSymbol(String),

    /// A returned string contained an interior NUL byte.
    #[error("String contains an interior NUL byte")]
    InteriorNul,

    /// Error raised by the core.
    #[error(transparent)]
    Hermes(#[from] HermesError),
}

impl From<FfiError> for HermesError {
    fn from(err: FfiError) -> Self {
        match err {
            FfiError::Hermes(inner) => inner,
            other => HermesError::native_init(other.to_string()),
        }
    }
}
