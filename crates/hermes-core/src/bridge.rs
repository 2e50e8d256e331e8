//! Callback bridge.
//!
//! Turns one native-side invocation into a call of the registered route
//! callback and turns the outcome back into a serialized [`CallbackReply`].
//! Every request-scoped failure is answered here; nothing a callback does can
//! escape the bridge as an error or an unwind.
//!
//! Outcomes, checked in order:
//!
//! | Condition | Status | Body |
//! |---|---|---|
//! | bridge closed | 503 | `{"error":"server closed"}` |
//! | no callback for the route, bridge closed meanwhile | 503 | `{"error":"server closed"}` |
//! | no callback for the route | 404 | `{"error":"not found"}` |
//! | body/params not decodable | 500 | `{"error":"malformed request: …"}` |
//! | callback returned `Err` or panicked | 500 | `{"error": <message>}` |
//! | result not a `{data, status}` response, or status outside `100..=599` | 500 | `{"error":"invalid response"}` |
//! | otherwise | `status` | `data` as JSON |

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::context::{Context, ContextBuilder};
use crate::error::{HermesError, HermesResult};
use crate::registry::{RouteCallback, RouteRegistry};
use crate::response::{CallbackReply, Reply, Response};
use crate::route::RouteKey;

/// Metric `route` label for requests that matched no registered route.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Serialized request handed over by the native engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackData {
    /// JSON-encoded body, if the request had one.
    pub body: Option<String>,
    /// JSON-encoded object of path parameters.
    pub params: Option<String>,
}

impl CallbackData {
    /// Creates callback data from raw JSON text.
    #[must_use]
    pub fn new(body: Option<String>, params: Option<String>) -> Self {
        Self { body, params }
    }
}

/// A failure reported by the engine in place of callback data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("native engine fault: {message}")]
pub struct EngineFault {
    message: String,
}

impl EngineFault {
    /// Creates a fault with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The function the native engine calls once per matched request.
///
/// The first argument carries either the request or an engine fault; a fault
/// is answered with a `500` without calling the route.
pub type Thunk = Arc<dyn Fn(Result<CallbackData, EngineFault>) -> CallbackReply + Send + Sync>;

/// Open/closed flag shared between the bridge and its owner.
#[derive(Debug, Default)]
pub struct Gate {
    closed: AtomicBool,
}

impl Gate {
    /// Creates an open gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
        }
    }

    /// Closes the gate. Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` once the gate has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Invokes route callbacks on behalf of the native engine.
#[derive(Debug)]
pub struct CallbackBridge {
    registry: Arc<RouteRegistry>,
    gate: Gate,
}

impl CallbackBridge {
    /// Creates a bridge over a registry.
    #[must_use]
    pub fn new(registry: Arc<RouteRegistry>) -> Self {
        Self {
            registry,
            gate: Gate::new(),
        }
    }

    /// The registry this bridge resolves routes from.
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// Stops invoking callbacks. Later invocations are answered `503`.
    pub fn close(&self) -> bool {
        self.gate.close()
    }

    /// Returns `true` after [`close`](Self::close).
    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Answers one request for `key`.
    pub async fn invoke(&self, key: &RouteKey, data: &CallbackData) -> CallbackReply {
        let started = Instant::now();
        let request_id = Uuid::now_v7();

        let (reply, routed) = self.answer(key, data, request_id).await;

        // Only registered patterns become label values.
        let route = if routed {
            key.to_string()
        } else {
            UNMATCHED_ROUTE.to_string()
        };
        metrics::counter!(
            "hermes_bridge_invocations_total",
            "route" => route.clone(),
            "status" => reply.status.to_string()
        )
        .increment(1);
        metrics::histogram!("hermes_bridge_duration_seconds", "route" => route)
            .record(started.elapsed().as_secs_f64());

        tracing::debug!(
            request_id = %request_id,
            route = %key,
            status = reply.status,
            duration_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "callback answered"
        );

        reply
    }

    /// Answers an engine-side thunk argument, which may be a fault.
    pub async fn invoke_with(
        &self,
        key: &RouteKey,
        data: Result<CallbackData, EngineFault>,
    ) -> CallbackReply {
        match data {
            Ok(data) => self.invoke(key, &data).await,
            Err(fault) => {
                tracing::error!(route = %key, error = %fault, "engine reported a fault");
                CallbackReply::error(500, &fault.to_string())
            }
        }
    }

    /// The reply, and whether it came from a registered route.
    async fn answer(
        &self,
        key: &RouteKey,
        data: &CallbackData,
        request_id: Uuid,
    ) -> (CallbackReply, bool) {
        if self.gate.is_closed() {
            return (CallbackReply::closed(), false);
        }

        let Some(entry) = self.registry.lookup(key) else {
            return (self.unmatched(), false);
        };

        let ctx = match ContextBuilder::build(data.body.as_deref(), data.params.as_deref()) {
            Ok(ctx) => ctx,
            Err(err) => {
                tracing::warn!(request_id = %request_id, route = %key, error = %err, "rejected request");
                return (CallbackReply::from_error(&err), true);
            }
        };

        let callback = Arc::clone(entry.callback());
        drop(entry);

        let reply = match Self::call(&callback, ctx).await {
            Ok(response) => CallbackReply::from_response(&response),
            Err(err) => {
                if matches!(err, HermesError::Callback(_)) {
                    tracing::error!(request_id = %request_id, route = %key, error = %err, "route callback failed");
                } else {
                    tracing::warn!(request_id = %request_id, route = %key, error = %err, "route callback returned an invalid response");
                }
                CallbackReply::from_error(&err)
            }
        };
        (reply, true)
    }

    /// Answer for a lookup miss. `close` clears the registry after shutting
    /// the gate, so a miss racing a close is reported as closed.
    fn unmatched(&self) -> CallbackReply {
        if self.gate.is_closed() {
            CallbackReply::closed()
        } else {
            CallbackReply::not_found()
        }
    }

    async fn call(callback: &RouteCallback, ctx: Context) -> HermesResult<Response> {
        let reply = panic::catch_unwind(AssertUnwindSafe(|| callback(ctx)))
            .map_err(|payload| HermesError::Callback(panic_message(payload.as_ref())))?
            .map_err(|e| HermesError::Callback(e.to_string()))?;
        settle(reply).await
    }
}

/// Resolves a reply, awaiting pending ones, into a validated response.
async fn settle(mut reply: Reply) -> HermesResult<Response> {
    loop {
        reply = match reply {
            Reply::Response(response) => return response.validated(),
            Reply::Value(value) => return Response::from_host_value(value),
            Reply::Undefined => return Err(HermesError::InvalidResponseShape),
            Reply::Pending(future) => AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(|payload| HermesError::Callback(panic_message(payload.as_ref())))?
                .map_err(|e| HermesError::Callback(e.to_string()))?,
        };
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}
