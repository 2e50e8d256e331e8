//! Error types for Hermes.
//!
//! [`HermesError`] covers both halves of the boundary. Setup-scoped variants
//! (handle lifecycle, initialization, registration) propagate to the caller.
//! Request-scoped variants (`MalformedRequest`, `Callback`,
//! `InvalidResponseShape`) never leave the callback bridge: they are turned
//! into a `500` reply there.
//!
//! | Variant | Scope | Recovered |
//! |---|---|---|
//! | `NativeInit` | setup | no, fatal |
//! | `UseAfterFree` | setup | no, programmer error |
//! | `HandleNotAcquired` | setup | no, programmer error |
//! | `HandleAlreadyAcquired` | setup | no |
//! | `MalformedRequest` | request | yes, 500 |
//! | `Callback` | request | yes, 500 + log |
//! | `InvalidResponseShape` | request | yes, 500 |

use thiserror::Error;

use crate::route::RouteKey;

/// Result type alias using [`HermesError`].
pub type HermesResult<T> = Result<T, HermesError>;

/// Standard error type for Hermes.
#[derive(Error, Debug)]
pub enum HermesError {
    /// The native engine could not be created (missing library, ABI
    /// mismatch, allocation failure).
    #[error("native engine failed to initialize: {0}")]
    NativeInit(String),

    /// An operation was attempted on a handle that was already freed.
    #[error("native handle used after free during `{operation}`")]
    UseAfterFree {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// An operation was attempted before the handle was acquired.
    #[error("native handle not acquired before `{operation}`")]
    HandleNotAcquired {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A second handle was requested from an owner that already holds one.
    #[error("native handle already acquired")]
    HandleAlreadyAcquired,

    /// Request body or params were not valid JSON of the expected shape.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The user callback failed.
    #[error("{0}")]
    Callback(String),

    /// The user callback returned something that is not a `{data, status}` response.
    #[error("invalid response")]
    InvalidResponseShape,

    /// The adapter was used after `close()`.
    #[error("server already closed")]
    AlreadyClosed,

    /// `listen` was called on an adapter that is already serving.
    #[error("server already listening")]
    AlreadyListening,

    /// The HTTP method is not one of the supported verbs.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// The engine cannot accept route registrations across its boundary.
    #[error("route {0} cannot be forwarded to the native engine")]
    RouteForwardingUnsupported(RouteKey),

    /// The native engine rejected an operation.
    #[error("native engine error: {0}")]
    Engine(String),
}

impl HermesError {
    /// Creates a native initialization error.
    #[must_use]
    pub fn native_init(message: impl Into<String>) -> Self {
        Self::NativeInit(message.into())
    }

    /// Creates a malformed request error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Creates an engine error.
    #[must_use]
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Returns `true` if this error belongs to a single request and must be
    /// answered rather than propagated.
    #[must_use]
    pub const fn is_request_scoped(&self) -> bool {
        matches!(
            self,
            Self::MalformedRequest(_) | Self::Callback(_) | Self::InvalidResponseShape
        )
    }

    /// Returns the HTTP status used when this error is answered at the bridge.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::AlreadyClosed => 503,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn test_error_display() {
        let err = HermesError::native_init("library not found");
        assert_eq!(
            err.to_string(),
            "native engine failed to initialize: library not found"
        );

        let err = HermesError::UseAfterFree { operation: "listen" };
        assert!(err.to_string().contains("listen"));
    }

    #[test]
    fn test_request_scoped() {
        assert!(HermesError::malformed("bad json").is_request_scoped());
        assert!(HermesError::Callback("boom".to_string()).is_request_scoped());
        assert!(HermesError::InvalidResponseShape.is_request_scoped());
        assert!(!HermesError::HandleAlreadyAcquired.is_request_scoped());
        assert!(!HermesError::native_init("x").is_request_scoped());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(HermesError::malformed("x").status_code(), 500);
        assert_eq!(HermesError::AlreadyClosed.status_code(), 503);
    }

    #[test]
    fn test_forwarding_error_names_route() {
        let key = RouteKey::new(Method::Get, "/users");
        let err = HermesError::RouteForwardingUnsupported(key);
        assert_eq!(
            err.to_string(),
            "route GET /users cannot be forwarded to the native engine"
        );
    }
}
