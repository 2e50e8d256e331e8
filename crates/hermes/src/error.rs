//! Errors surfaced to application setup code.

use hermes_config::ConfigError;
use hermes_core::HermesError;
use hermes_telemetry::TelemetryError;
use thiserror::Error;

/// Result type for [`App`](crate::App) operations.
pub type AppResult<T> = Result<T, AppError>;

/// Setup-scoped failure of the application facade.
///
/// Request-scoped failures never reach this type; the callback bridge answers
/// them with a `500` reply.
#[derive(Error, Debug)]
pub enum AppError {
    /// Handle lifecycle, registration or engine failure.
    #[error(transparent)]
    Hermes(#[from] HermesError),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The logging subscriber could not be configured.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

impl AppError {
    /// The core error, if this is one.
    #[must_use]
    pub const fn as_hermes(&self) -> Option<&HermesError> {
        match self {
            Self::Hermes(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hermes_errors_are_transparent() {
        let err = AppError::from(HermesError::AlreadyClosed);
        assert_eq!(err.to_string(), "server already closed");
        assert!(matches!(err.as_hermes(), Some(HermesError::AlreadyClosed)));
    }

    #[test]
    fn test_config_error_display() {
        let err = AppError::from(ConfigError::UnsupportedFormat("yaml".to_string()));
        assert!(err.to_string().starts_with("configuration error"));
        assert!(err.as_hermes().is_none());
    }
}
