//! Response values on both sides of the boundary.
//!
//! - [`Response`] is what a route callback produces on the managed side.
//! - [`Reply`] is the raw return value of a callback before validation.
//! - [`CallbackReply`] is the serialized `(data, status)` pair handed back to
//!   the native engine.

use std::fmt;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::HermesError;

/// Default status for a response that does not name one.
pub const DEFAULT_STATUS: u16 = 200;

/// Status codes a response may carry.
pub const STATUS_RANGE: std::ops::RangeInclusive<u16> = 100..=599;

/// A `{data, status}` response produced by a route callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// JSON payload, `null` for no content.
    pub data: Value,
    /// HTTP status code.
    pub status: u16,
}

impl Response {
    /// Creates a `200` response.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            status: DEFAULT_STATUS,
        }
    }

    /// Replaces the status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Rejects a status outside [`STATUS_RANGE`].
    pub fn validated(self) -> Result<Self, HermesError> {
        if STATUS_RANGE.contains(&self.status) {
            Ok(self)
        } else {
            Err(HermesError::InvalidResponseShape)
        }
    }

    /// Validates an arbitrary host value as a response.
    ///
    /// The value must be an object with a `data` key. `status` may be
    /// omitted or `null` (meaning `200`); otherwise it must be an integer in
    /// `100..=599`. Extra keys are ignored.
    pub fn from_host_value(value: Value) -> Result<Self, HermesError> {
        let Value::Object(mut map) = value else {
            return Err(HermesError::InvalidResponseShape);
        };

        let data = map.remove("data").ok_or(HermesError::InvalidResponseShape)?;

        let status = match map.remove("status") {
            None | Some(Value::Null) => DEFAULT_STATUS,
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|s| u16::try_from(s).ok())
                .filter(|s| STATUS_RANGE.contains(s))
                .ok_or(HermesError::InvalidResponseShape)?,
            Some(_) => return Err(HermesError::InvalidResponseShape),
        };

        Ok(Self { data, status })
    }
}

/// The raw value a route callback returns.
///
/// Callbacks written in Rust usually return [`Reply::Response`]. Values that
/// arrive from a dynamically typed host are carried as [`Reply::Value`] and
/// validated by the bridge.
pub enum Reply {
    /// A well-formed response.
    Response(Response),
    /// An unvalidated host value; must have the `{data, status}` shape.
    Value(Value),
    /// The callback produced nothing.
    Undefined,
    /// A response that completes later.
    Pending(BoxFuture<'static, anyhow::Result<Reply>>),
}

impl Reply {
    /// Wraps a future as a pending reply.
    pub fn pending<F>(future: F) -> Self
    where
        F: std::future::Future<Output = anyhow::Result<Reply>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(r) => f.debug_tuple("Response").field(r).finish(),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Undefined => f.write_str("Undefined"),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Undefined
    }
}

/// Serialized response crossing back into the native engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackReply {
    /// JSON-encoded payload.
    pub data: String,
    /// HTTP status code.
    pub status: u16,
}

impl CallbackReply {
    /// Serializes a response. A payload that fails to serialize becomes a `500`.
    #[must_use]
    pub fn from_response(response: &Response) -> Self {
        match serde_json::to_string(&response.data) {
            Ok(data) => Self {
                data,
                status: response.status,
            },
            Err(e) => Self::error(500, &e.to_string()),
        }
    }

    /// Builds an `{"error": message}` reply.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            data: json!({ "error": message }).to_string(),
            status,
        }
    }

    /// Builds the reply for an error caught at the bridge.
    #[must_use]
    pub fn from_error(err: &HermesError) -> Self {
        Self::error(err.status_code(), &err.to_string())
    }

    /// `404` for a route with no registered callback.
    #[must_use]
    pub fn not_found() -> Self {
        Self::error(404, "not found")
    }

    /// `503` for requests arriving after shutdown began.
    #[must_use]
    pub fn closed() -> Self {
        Self::error(503, "server closed")
    }

    /// `504` for a host that did not answer in time.
    #[must_use]
    pub fn timeout() -> Self {
        Self::error(504, "callback timeout")
    }

    /// Returns `true` for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the payload back into JSON.
    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.data)
    }
}
