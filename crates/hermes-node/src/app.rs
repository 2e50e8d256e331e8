//! The `App` class exposed to JavaScript.

use std::sync::Arc;
use std::time::Duration;

use hermes::{Adapter, InProcessAdapter, Runtime, ENV_PREFIX};
use hermes_config::{ConfigLoader, HermesConfig};
use hermes_core::{BridgeOptions, CallbackData, LoopbackEngine, Method, RouteKey};
use napi::bindgen_prelude::This;
use napi::JsFunction;
use napi_derive::napi;

use crate::callback::{route_callback, JsRoute};
use crate::error::to_napi_error;
use crate::scheduler::NapiScheduler;

type NodeAdapter = InProcessAdapter<LoopbackEngine, NapiScheduler>;

/// Options for `new App()`.
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// How long an engine thread waits for a callback, in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Force the reported runtime (`node`, `bun` or `deno`).
    pub runtime: Option<String>,
}

/// Reply returned by `App.inject`.
#[napi(object)]
#[derive(Debug, Clone)]
pub struct InjectReply {
    /// JSON-encoded payload.
    pub data: String,
    /// HTTP status code.
    pub status: u32,
}

/// Call count of one route, as returned by `App.getStats`.
#[napi(object)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStat {
    /// HTTP method.
    pub method: String,
    /// Route path pattern.
    pub path: String,
    /// Number of callback invocations.
    pub calls: i64,
}

/// Routes served by one native engine instance.
///
/// ## Example
///
/// ```typescript
/// const app = new App();
///
/// app
///   .get('/hello/:name', (ctx) => respond({ message: `Hello, ${ctx.params.name}!` }))
///   .post('/data', async (ctx) => respond({ received: ctx.body }, 201));
///
/// app.listen(3000, () => console.log('ready'));
/// ```
#[napi]
pub struct App {
    adapter: Arc<NodeAdapter>,
    runtime: Runtime,
}

#[napi]
impl App {
    /// Create an app. Configuration is read from `HERMES__*` variables first.
    #[napi(constructor)]
    pub fn new(options: Option<AppOptions>) -> napi::Result<Self> {
        let config = ConfigLoader::new()
            .with_env_prefix(ENV_PREFIX)
            .load()
            .map_err(to_napi_error)?;
        let options = options.unwrap_or_default();

        let runtime = Runtime::detect(&runtime_section(&config, &options));
        let timeout = options
            .timeout_ms
            .map(|ms| Duration::from_millis(u64::from(ms)))
            .or_else(|| config.bridge.timeout());

        let adapter = InProcessAdapter::new(
            Arc::new(LoopbackEngine::new()),
            BridgeOptions { timeout },
        )
        .map_err(to_napi_error)?;

        tracing::debug!(runtime = %runtime, "node app created");
        Ok(Self {
            adapter: Arc::new(adapter),
            runtime,
        })
    }

    /// Register a GET route.
    #[napi]
    pub fn get(&self, this: This, path: String, callback: JsFunction) -> napi::Result<This> {
        self.register(Method::Get, path, &callback)?;
        Ok(this)
    }

    /// Register a POST route.
    #[napi]
    pub fn post(&self, this: This, path: String, callback: JsFunction) -> napi::Result<This> {
        self.register(Method::Post, path, &callback)?;
        Ok(this)
    }

    /// Register a PUT route.
    #[napi]
    pub fn put(&self, this: This, path: String, callback: JsFunction) -> napi::Result<This> {
        self.register(Method::Put, path, &callback)?;
        Ok(this)
    }

    /// Register a DELETE route.
    #[napi]
    pub fn delete(&self, this: This, path: String, callback: JsFunction) -> napi::Result<This> {
        self.register(Method::Delete, path, &callback)?;
        Ok(this)
    }

    /// Register a PATCH route.
    #[napi]
    pub fn patch(&self, this: This, path: String, callback: JsFunction) -> napi::Result<This> {
        self.register(Method::Patch, path, &callback)?;
        Ok(this)
    }

    /// Register a HEAD route.
    #[napi]
    pub fn head(&self, this: This, path: String, callback: JsFunction) -> napi::Result<This> {
        self.register(Method::Head, path, &callback)?;
        Ok(this)
    }

    /// Register an OPTIONS route.
    #[napi]
    pub fn options(&self, this: This, path: String, callback: JsFunction) -> napi::Result<This> {
        self.register(Method::Options, path, &callback)?;
        Ok(this)
    }

    /// Start serving on `port`, then call `onReady`.
    #[napi]
    pub fn listen(&self, port: u32, on_ready: Option<JsFunction>) -> napi::Result<()> {
        let port = u16::try_from(port).map_err(|_| {
            napi::Error::new(napi::Status::InvalidArg, format!("port out of range: {port}"))
        })?;
        self.adapter.listen(port).map_err(to_napi_error)?;

        if let Some(on_ready) = on_ready {
            on_ready.call_without_args(None)?;
        }
        Ok(())
    }

    /// Stop callbacks, free the engine and drop every route. Safe to call twice.
    #[napi]
    pub fn close(&self) -> napi::Result<()> {
        self.adapter.close().map_err(to_napi_error)
    }

    /// Whether `close()` has run.
    #[napi(getter)]
    pub fn closed(&self) -> bool {
        self.adapter.is_closed()
    }

    /// Number of registered routes.
    #[napi(getter)]
    pub fn route_count(&self) -> u32 {
        u32::try_from(self.adapter.registry().count()).unwrap_or(u32::MAX)
    }

    /// Call counts per route, busiest first.
    #[napi]
    pub fn get_stats(&self) -> Vec<RouteStat> {
        route_stats(self.adapter.registry().stats())
    }

    /// The detected runtime: `node`, `bun`, `deno` or `unknown`.
    #[napi]
    pub fn current_runtime(&self) -> String {
        self.runtime.as_str().to_string()
    }

    /// Send a request through the engine without opening a socket.
    #[napi]
    pub async fn inject(
        &self,
        method: String,
        path: String,
        body: Option<String>,
        params: Option<String>,
    ) -> napi::Result<InjectReply> {
        let method: Method = method.parse().map_err(to_napi_error)?;
        let adapter = Arc::clone(&self.adapter);
        let reply = adapter
            .inject(method, &path, CallbackData::new(body, params))
            .await;
        Ok(InjectReply {
            data: reply.data,
            status: u32::from(reply.status),
        })
    }

    fn register(&self, method: Method, path: String, callback: &JsFunction) -> napi::Result<()> {
        let tsfn: JsRoute = callback.create_threadsafe_function(0, |ctx| Ok(vec![ctx.value]))?;
        self.adapter
            .register_route(RouteKey::new(method, path), route_callback(tsfn))
            .map_err(to_napi_error)
    }
}

fn route_stats(stats: Vec<(RouteKey, u64)>) -> Vec<RouteStat> {
    stats
        .into_iter()
        .map(|(key, calls)| RouteStat {
            method: key.method.as_str().to_string(),
            path: key.path,
            calls: i64::try_from(calls).unwrap_or(i64::MAX),
        })
        .collect()
}

fn runtime_section(config: &HermesConfig, options: &AppOptions) -> hermes_config::RuntimeConfig {
    let mut section = config.runtime.clone();
    if let Some(forced) = &options.runtime {
        section.force = Some(forced.clone());
    }
    section
}
