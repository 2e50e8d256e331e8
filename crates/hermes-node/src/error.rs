//! Error conversion for the JavaScript surface.

use std::fmt::Display;

use napi::Status;

/// Converts a setup error into a thrown JS `Error`.
pub fn to_napi_error(err: impl Display) -> napi::Error {
    napi::Error::new(Status::GenericFailure, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::HermesError;

    #[test]
    fn test_message_is_kept() {
        let err = to_napi_error(HermesError::AlreadyListening);
        assert_eq!(err.reason, "server already listening");
        assert_eq!(err.status, Status::GenericFailure);
    }
}
