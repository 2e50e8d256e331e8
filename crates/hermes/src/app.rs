//! The application-facing routing API.

use std::sync::Arc;

use hermes_config::{ConfigLoader, HermesConfig};
use hermes_core::{
    BridgeOptions, CallbackData, CallbackReply, Context, LoopbackEngine, Method, Reply,
    RouteCallback, RouteKey,
};
use hermes_telemetry::{create_env_filter, init_logging, LogConfig};

use crate::adapter::{Adapter, AdapterImpl, AdapterKind};
use crate::dylib::DylibAdapter;
use crate::error::AppResult;
use crate::in_process::InProcessAdapter;
use crate::runtime::Runtime;

/// Environment prefix read by [`App::create`].
pub const ENV_PREFIX: &str = "HERMES";

/// A set of routes served by one native engine instance.
///
/// # Example
///
/// ```rust,ignore
/// use hermes::App;
/// use serde_json::json;
///
/// let app = App::create()?;
/// app.get("/hello/:name", |ctx| {
///     let name = ctx.param("name").unwrap_or("world").to_string();
///     Ok(ctx.respond(json!({ "message": format!("Hello, {name}!") })))
/// })?
/// .post("/data", |ctx| Ok(ctx.respond_with_status(json!({ "received": ctx.body }), 201)))?;
///
/// app.listen_with(3000, |port| println!("listening on {port}"))?;
/// ```
#[derive(Debug)]
pub struct App {
    adapter: AdapterImpl,
    runtime: Runtime,
}

impl App {
    /// Builds an app from `hermes.toml` (if present), `.env` and `HERMES__*`
    /// variables.
    pub fn create() -> AppResult<Self> {
        let config = ConfigLoader::new()
            .with_dotenv()
            .with_optional_file("hermes.toml")?
            .with_env_prefix(ENV_PREFIX)
            .load()?;
        Self::with_config(&config)
    }

    /// Builds an app from an explicit configuration.
    pub fn with_config(config: &HermesConfig) -> AppResult<Self> {
        if config.logging.enabled {
            let log_config = LogConfig::from(&config.logging);
            create_env_filter(&log_config.level)?;
            if let Err(err) = init_logging(&log_config) {
                tracing::debug!(error = %err, "keeping existing global subscriber");
            }
        }

        let runtime = Runtime::detect(&config.runtime);
        let adapter: AdapterImpl = match runtime.adapter_kind() {
            AdapterKind::InProcess => {
                let options = BridgeOptions {
                    timeout: config.bridge.timeout(),
                };
                InProcessAdapter::new(Arc::new(LoopbackEngine::new()), options)?.into()
            }
            AdapterKind::Dylib => DylibAdapter::from_config(&config.native)?.into(),
        };

        tracing::info!(runtime = %runtime, adapter = %adapter.kind(), "app created");
        Ok(Self::with_adapter(adapter, runtime))
    }

    /// Wraps an adapter that was built by hand.
    #[must_use]
    pub fn with_adapter(adapter: AdapterImpl, runtime: Runtime) -> Self {
        Self { adapter, runtime }
    }

    /// Registers `callback` for `method` and `path`. A later registration of
    /// the same pair replaces it.
    pub fn route<F, R>(&self, method: Method, path: &str, callback: F) -> AppResult<&Self>
    where
        F: Fn(Context) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        let callback: RouteCallback = Arc::new(move |ctx| callback(ctx).map(Into::into));
        self.adapter
            .register_route(RouteKey::new(method, path), callback)?;
        Ok(self)
    }

    /// Registers a `GET` route.
    pub fn get<F, R>(&self, path: &str, callback: F) -> AppResult<&Self>
    where
        F: Fn(Context) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.route(Method::Get, path, callback)
    }

    /// Registers a `POST` route.
    pub fn post<F, R>(&self, path: &str, callback: F) -> AppResult<&Self>
    where
        F: Fn(Context) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.route(Method::Post, path, callback)
    }

    /// Registers a `PUT` route.
    pub fn put<F, R>(&self, path: &str, callback: F) -> AppResult<&Self>
    where
        F: Fn(Context) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.route(Method::Put, path, callback)
    }

    /// Registers a `DELETE` route.
    pub fn delete<F, R>(&self, path: &str, callback: F) -> AppResult<&Self>
    where
        F: Fn(Context) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.route(Method::Delete, path, callback)
    }

    /// Registers a `PATCH` route.
    pub fn patch<F, R>(&self, path: &str, callback: F) -> AppResult<&Self>
    where
        F: Fn(Context) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.route(Method::Patch, path, callback)
    }

    /// Registers a `HEAD` route.
    pub fn head<F, R>(&self, path: &str, callback: F) -> AppResult<&Self>
    where
        F: Fn(Context) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.route(Method::Head, path, callback)
    }

    /// Registers an `OPTIONS` route.
    pub fn options<F, R>(&self, path: &str, callback: F) -> AppResult<&Self>
    where
        F: Fn(Context) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.route(Method::Options, path, callback)
    }

    /// Starts serving on `port`.
    pub fn listen(&self, port: u16) -> AppResult<()> {
        self.listen_with(port, |_| {})
    }

    /// Starts serving on `port` and calls `on_ready` once the engine accepted
    /// the port.
    pub fn listen_with(&self, port: u16, on_ready: impl FnOnce(u16)) -> AppResult<()> {
        self.adapter.listen(port)?;
        on_ready(port);
        Ok(())
    }

    /// Stops callbacks, frees the engine and drops every route. A second call
    /// does nothing.
    pub fn close(&self) -> AppResult<()> {
        self.adapter.close()?;
        Ok(())
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.adapter.is_closed()
    }

    /// The runtime detected when the app was built.
    pub fn current_runtime(&self) -> Runtime {
        self.runtime
    }

    /// Call counts per registered route, busiest first.
    pub fn stats(&self) -> Vec<(RouteKey, u64)> {
        self.adapter.registry().stats()
    }

    /// The adapter serving this app.
    pub fn adapter(&self) -> &AdapterImpl {
        &self.adapter
    }

    /// Sends a request through the engine without a network round trip.
    pub async fn inject(
        &self,
        method: Method,
        path: &str,
        body: Option<&str>,
        params: Option<&str>,
    ) -> CallbackReply {
        let data = CallbackData::new(body.map(str::to_string), params.map(str::to_string));
        self.adapter.inject(method, path, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{HermesError, Response};
    use serde_json::json;

    fn app() -> App {
        App::with_config(&HermesConfig::default()).unwrap()
    }

    #[test]
    fn test_default_config_runs_in_process() {
        let app = app();
        assert_eq!(app.current_runtime(), Runtime::Unknown);
        assert_eq!(app.adapter().kind(), AdapterKind::InProcess);
    }

    #[test]
    fn test_forced_deno_uses_dylib() {
        let mut config = HermesConfig::default();
        config.runtime.force = Some("deno".to_string());
        let app = App::with_config(&config).unwrap();
        assert_eq!(app.current_runtime(), Runtime::Deno);
        assert_eq!(app.adapter().kind(), AdapterKind::Dylib);
    }

    #[test]
    fn test_chained_registration() {
        let app = app();
        app.get("/a", |ctx| Ok(ctx.respond(json!("a"))))
            .unwrap()
            .post("/a", |_| Ok(json!({ "data": "b", "status": 201 })))
            .unwrap()
            .put("/a", |_| Ok(Response::new(json!("c"))))
            .unwrap()
            .delete("/a", |_| Ok(()))
            .unwrap()
            .patch("/a", |ctx| Ok(ctx.respond(json!("e"))))
            .unwrap()
            .head("/a", |ctx| Ok(ctx.respond(json!(null))))
            .unwrap()
            .options("/a", |ctx| Ok(ctx.respond(json!(["GET"]))))
            .unwrap();

        let AdapterImpl::InProcess(adapter) = app.adapter() else {
            panic!("expected in-process adapter");
        };
        assert_eq!(adapter.registry().count(), 7);
    }

    #[test]
    fn test_listen_with_reports_port() {
        let app = app();
        let mut ready = None;
        app.listen_with(8123, |port| ready = Some(port)).unwrap();
        assert_eq!(ready, Some(8123));

        let err = app.listen(8123).unwrap_err();
        assert!(matches!(err.as_hermes(), Some(HermesError::AlreadyListening)));
    }

    #[test]
    fn test_close_twice_and_register_after_close() {
        let app = app();
        app.close().unwrap();
        app.close().unwrap();
        assert!(app.is_closed());

        let err = app.get("/late", |ctx| Ok(ctx.respond(json!(1)))).unwrap_err();
        assert!(matches!(err.as_hermes(), Some(HermesError::AlreadyClosed)));
    }

    #[test]
    fn test_invalid_log_filter_is_rejected() {
        let mut config = HermesConfig::default();
        config.logging.enabled = true;
        config.logging.level = "hermes=[[[".to_string();
        assert!(App::with_config(&config).is_err());
    }
}
