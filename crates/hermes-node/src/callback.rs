//! JavaScript route callbacks.
//!
//! A JS callback receives the context as a plain object
//! (`{ body, params, query, headers }`) and returns `{ data, status? }`,
//! either directly or through a Promise.

use std::sync::Arc;

use hermes_core::{Context, Reply, RouteCallback};
use napi::bindgen_prelude::{Either, Promise};
use napi::threadsafe_function::{ErrorStrategy, ThreadsafeFunction};
use serde_json::{json, Value};

/// A JS callback callable from any thread.
pub type JsRoute = ThreadsafeFunction<Value, ErrorStrategy::Fatal>;

/// Wraps a JS callback as a route callback.
///
/// The call is scheduled on the JavaScript thread; the returned reply is
/// pending until JS answers, so the host scheduler is never blocked.
pub fn route_callback(tsfn: JsRoute) -> RouteCallback {
    Arc::new(move |ctx: Context| {
        let input = context_value(&ctx)?;
        let tsfn = tsfn.clone();
        Ok(Reply::pending(async move {
            let returned = tsfn
                .call_async::<Either<Promise<Value>, Value>>(input)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e.reason))?;
            let value = match returned {
                Either::A(promise) => promise.await.map_err(|e| anyhow::anyhow!("{}", e.reason))?,
                Either::B(value) => value,
            };
            Ok(reply_from_js(value))
        }))
    })
}

/// The object a JS callback receives.
pub fn context_value(ctx: &Context) -> serde_json::Result<Value> {
    serde_json::to_value(ctx)
}

/// `undefined` and `null` are not responses; everything else is validated
/// by the bridge.
pub fn reply_from_js(value: Value) -> Reply {
    if value.is_null() {
        Reply::Undefined
    } else {
        Reply::Value(value)
    }
}

/// The `{data, status}` object built by the JS `respond` helper.
pub fn response_value(data: Value, status: Option<u32>) -> Value {
    json!({ "data": data, "status": status.unwrap_or(200) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{ContextBuilder, Response};

    #[test]
    fn test_context_value_shape() {
        let ctx = ContextBuilder::build(Some(r#"{"x":1}"#), Some(r#"{"id":"7"}"#)).unwrap();
        let value = context_value(&ctx).unwrap();
        assert_eq!(value["body"], json!({"x": 1}));
        assert_eq!(value["params"], json!({"id": "7"}));
        assert_eq!(value["query"], json!({}));
        assert_eq!(value["headers"], json!({}));
    }

    #[test]
    fn test_absent_body_is_null() {
        let value = context_value(&Context::default()).unwrap();
        assert!(value["body"].is_null());
    }

    #[test]
    fn test_reply_from_js() {
        assert!(matches!(reply_from_js(Value::Null), Reply::Undefined));
        assert!(matches!(
            reply_from_js(json!({"data": 1})),
            Reply::Value(_)
        ));
    }

    #[test]
    fn test_response_value_is_a_valid_response() {
        let value = response_value(json!({"ok": true}), None);
        let response = Response::from_host_value(value).unwrap();
        assert_eq!(response.status, 200);

        let value = response_value(json!(null), Some(204));
        assert_eq!(Response::from_host_value(value).unwrap().status, 204);
    }
}
