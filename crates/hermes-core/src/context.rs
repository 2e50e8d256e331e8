//! Per-request context handed to route callbacks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HermesError, HermesResult};
use crate::response::Response;

/// The request as seen by a route callback.
///
/// Built fresh for every invocation and never shared across requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Decoded request body. `None` when the engine supplied no body,
    /// `Some(Value::Null)` when it supplied the literal `null`.
    pub body: Option<Value>,
    /// Path parameters extracted by the engine's matcher.
    pub params: HashMap<String, String>,
    /// Query parameters.
    pub query: HashMap<String, String>,
    /// Request headers.
    pub headers: HashMap<String, String>,
}

impl Context {
    /// Returns a path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Builds a `200` response carrying `data`.
    #[must_use]
    pub fn respond(&self, data: Value) -> Response {
        Response::new(data)
    }

    /// Builds a response carrying `data` with an explicit status.
    #[must_use]
    pub fn respond_with_status(&self, data: Value, status: u16) -> Response {
        Response::new(data).with_status(status)
    }
}

/// Decodes the serialized request that crosses the native boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    /// Builds a [`Context`] from raw JSON text.
    ///
    /// Absent input stays absent. `raw_params` must decode to an object whose
    /// values are strings, numbers or booleans; non-string scalars are kept as
    /// their JSON text.
    pub fn build(raw_body: Option<&str>, raw_params: Option<&str>) -> HermesResult<Context> {
        let body = raw_body
            .map(|raw| {
                serde_json::from_str::<Value>(raw)
                    .map_err(|e| HermesError::malformed(format!("body: {e}")))
            })
            .transpose()?;

        let params = match raw_params {
            Some(raw) => Self::decode_params(raw)?,
            None => HashMap::new(),
        };

        Ok(Context {
            body,
            params,
            ..Context::default()
        })
    }

    fn decode_params(raw: &str) -> HermesResult<HashMap<String, String>> {
        let map: Map<String, Value> = serde_json::from_str(raw)
            .map_err(|e| HermesError::malformed(format!("params: {e}")))?;

        map.into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => Ok((name, s)),
                Value::Number(_) | Value::Bool(_) => Ok((name, value.to_string())),
                other => Err(HermesError::malformed(format!(
                    "params: `{name}` must be a scalar, got {other}"
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_build_full() {
        let ctx = ContextBuilder::build(Some(r#"{"x":1}"#), Some(r#"{"name":"Ada"}"#)).unwrap();
        assert_eq!(ctx.body, Some(json!({"x": 1})));
        assert_eq!(ctx.param("name"), Some("Ada"));
        assert!(ctx.query.is_empty());
        assert!(ctx.headers.is_empty());
    }

    #[test]
    fn test_build_absent_vs_null() {
        let ctx = ContextBuilder::build(None, None).unwrap();
        assert_eq!(ctx.body, None);
        assert!(ctx.params.is_empty());

        let ctx = ContextBuilder::build(Some("null"), None).unwrap();
        assert_eq!(ctx.body, Some(Value::Null));
    }

    #[test]
    fn test_build_scalar_params_rendered() {
        let ctx = ContextBuilder::build(None, Some(r#"{"id":42,"flag":true}"#)).unwrap();
        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.param("flag"), Some("true"));
    }

    #[test]
    fn test_build_malformed_body() {
        let err = ContextBuilder::build(Some("{not json"), None).unwrap_err();
        assert!(matches!(err, HermesError::MalformedRequest(_)));
        assert!(err.to_string().starts_with("malformed request: body"));
    }

    #[test]
    fn test_build_malformed_params() {
        for raw in ["[1,2]", "\"id\"", r#"{"a":{"b":1}}"#, r#"{"a":null}"#, "{"] {
            let err = ContextBuilder::build(None, Some(raw)).unwrap_err();
            assert!(matches!(err, HermesError::MalformedRequest(_)), "{raw}");
        }
    }

    #[test]
    fn test_respond_helpers() {
        let ctx = Context::default();
        assert_eq!(ctx.respond(json!("ok")).status, 200);

        let response = ctx.respond_with_status(json!({"received": 1}), 201);
        assert_eq!(response.status, 201);
        assert_eq!(response.data, json!({"received": 1}));
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
        ]
    }

    fn json_value() -> impl Strategy<Value = Value> {
        json_leaf().prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::hash_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_build_roundtrips_serialized_request(
            body in prop::option::of(json_value()),
            params in prop::collection::hash_map("[a-z]{1,8}", "[^\"\\\\]{0,12}", 0..5),
        ) {
            let raw_body = body.as_ref().map(Value::to_string);
            let raw_params = serde_json::to_string(&params).unwrap();

            let ctx = ContextBuilder::build(raw_body.as_deref(), Some(&raw_params)).unwrap();

            prop_assert_eq!(ctx.body, body);
            prop_assert_eq!(ctx.params, params);
        }
    }
}
