//! In-process strategy: the engine calls route thunks directly.
//!
//! Every registered route hands the engine a thunk built on a
//! [`HostChannel`]. The engine invokes it from its own worker thread; the
//! thunk hops onto the host scheduler, runs the callback bridge there and
//! blocks the worker until the reply arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hermes_core::{
    BridgeOptions, CallbackBridge, CallbackData, CallbackReply, HandleSlot, HandleStatus,
    HermesError, HermesResult, HostChannel, LoopbackEngine, Method, NativeEngine, RouteCallback,
    RouteKey, RouteRegistry, Scheduler,
};

use crate::adapter::{Adapter, AdapterKind};

/// Adapter over an engine that accepts route thunks.
pub struct InProcessAdapter<E: NativeEngine, S: Scheduler> {
    registry: Arc<RouteRegistry>,
    bridge: Arc<CallbackBridge>,
    slot: HandleSlot<E>,
    channel: Arc<HostChannel<S>>,
    listening: AtomicBool,
}

impl<E: NativeEngine, S: Scheduler> InProcessAdapter<E, S> {
    /// Starts the host scheduler and acquires the engine handle.
    ///
    /// # Errors
    ///
    /// Returns `NativeInit` if the scheduler cannot start or the engine
    /// returns a null handle.
    pub fn new(engine: Arc<E>, options: BridgeOptions) -> HermesResult<Self> {
        let registry = Arc::new(RouteRegistry::new());
        let bridge = Arc::new(CallbackBridge::new(Arc::clone(&registry)));
        let scheduler = Arc::new(S::start(Arc::clone(&bridge))?);
        let channel = Arc::new(HostChannel::new(Arc::clone(&scheduler), options));

        let slot = HandleSlot::new(engine);
        if let Err(err) = slot.acquire() {
            scheduler.shutdown();
            return Err(err);
        }

        Ok(Self {
            registry,
            bridge,
            slot,
            channel,
            listening: AtomicBool::new(false),
        })
    }

    /// The routes registered so far.
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// The bridge the host scheduler runs.
    pub fn bridge(&self) -> &Arc<CallbackBridge> {
        &self.bridge
    }

    /// The engine behind the handle.
    pub fn engine(&self) -> &Arc<E> {
        self.slot.engine()
    }

    /// The host scheduler.
    pub fn scheduler(&self) -> &Arc<S> {
        self.channel.scheduler()
    }

    /// Lifecycle state of the engine handle.
    pub fn handle_status(&self) -> HandleStatus {
        self.slot.status()
    }

    /// Runs one request through the bridge on the host, the way an engine
    /// thunk would.
    pub fn call(&self, key: RouteKey, data: CallbackData) -> CallbackReply {
        self.channel.call(key, Ok(data))
    }
}

impl<S: Scheduler> InProcessAdapter<LoopbackEngine, S> {
    /// Sends a request through the loopback engine.
    pub async fn inject(&self, method: Method, path: &str, data: CallbackData) -> CallbackReply {
        self.engine().dispatch(method, path, data).await
    }
}

impl<E: NativeEngine, S: Scheduler> Adapter for InProcessAdapter<E, S> {
    fn kind(&self) -> AdapterKind {
        AdapterKind::InProcess
    }

    fn register_route(&self, key: RouteKey, callback: RouteCallback) -> HermesResult<()> {
        if self.bridge.is_closed() {
            return Err(HermesError::AlreadyClosed);
        }

        self.registry.register(key.clone(), callback);
        self.slot.register_route(&key, self.channel.thunk(key.clone()))?;
        tracing::debug!(route = %key, "route handed to engine");
        Ok(())
    }

    fn listen(&self, port: u16) -> HermesResult<Option<String>> {
        if self.bridge.is_closed() {
            return Err(HermesError::AlreadyClosed);
        }
        if self.listening.swap(true, Ordering::AcqRel) {
            return Err(HermesError::AlreadyListening);
        }

        match self.slot.listen(port) {
            Ok(message) => {
                tracing::info!(
                    port,
                    routes = self.registry.count(),
                    engine_message = message.as_deref().unwrap_or_default(),
                    "engine listening"
                );
                Ok(message)
            }
            Err(err) => {
                self.listening.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    fn close(&self) -> HermesResult<()> {
        if !self.bridge.close() {
            return Ok(());
        }

        self.channel.scheduler().shutdown();
        self.slot.release()?;
        self.registry.clear();
        tracing::info!("in-process adapter closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.bridge.is_closed()
    }
}

impl<E: NativeEngine, S: Scheduler> std::fmt::Debug for InProcessAdapter<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessAdapter")
            .field("routes", &self.registry.count())
            .field("handle", &self.slot.status())
            .field("listening", &self.listening.load(Ordering::Acquire))
            .field("closed", &self.bridge.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{Context, HostLoop, Reply};
    use serde_json::json;

    fn route<F>(f: F) -> RouteCallback
    where
        F: Fn(Context) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn adapter() -> InProcessAdapter<LoopbackEngine, HostLoop> {
        InProcessAdapter::new(Arc::new(LoopbackEngine::new()), BridgeOptions::default()).unwrap()
    }

    #[test]
    fn test_new_acquires_handle() {
        let adapter = adapter();
        assert_eq!(adapter.handle_status(), HandleStatus::Active);
        assert_eq!(adapter.engine().created(), 1);
        assert_eq!(adapter.kind(), AdapterKind::InProcess);
    }

    #[test]
    fn test_register_forwards_thunk() {
        let adapter = adapter();
        adapter
            .register_route(
                RouteKey::new(Method::Get, "/a"),
                route(|ctx| Ok(ctx.respond(json!("a")).into())),
            )
            .unwrap();

        assert_eq!(adapter.registry().count(), 1);
        assert_eq!(adapter.engine().current().unwrap().route_count(), 1);
    }

    #[tokio::test]
    async fn test_inject_runs_callback() {
        let adapter = adapter();
        adapter
            .register_route(
                RouteKey::new(Method::Get, "/hello/:name"),
                route(|ctx| {
                    let name = ctx.param("name").unwrap_or("world").to_string();
                    Ok(ctx.respond(json!({ "message": format!("Hello, {name}!") })).into())
                }),
            )
            .unwrap();

        let reply = adapter
            .inject(
                Method::Get,
                "/hello/:name",
                CallbackData::new(None, Some(r#"{"name":"Ada"}"#.to_string())),
            )
            .await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.data, r#"{"message":"Hello, Ada!"}"#);
    }

    #[test]
    fn test_listen_twice() {
        let adapter = adapter();
        assert_eq!(
            adapter.listen(3000).unwrap().as_deref(),
            Some("listening on port 3000")
        );
        assert!(matches!(
            adapter.listen(3000),
            Err(HermesError::AlreadyListening)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let adapter = adapter();
        adapter
            .register_route(
                RouteKey::new(Method::Get, "/"),
                route(|ctx| Ok(ctx.respond(json!(null)).into())),
            )
            .unwrap();

        adapter.close().unwrap();
        adapter.close().unwrap();

        assert!(adapter.is_closed());
        assert_eq!(adapter.handle_status(), HandleStatus::Freed);
        assert_eq!(adapter.engine().freed(), 1);
        assert_eq!(adapter.registry().count(), 0);
    }

    #[test]
    fn test_use_after_close() {
        let adapter = adapter();
        adapter.close().unwrap();

        let err = adapter
            .register_route(
                RouteKey::new(Method::Get, "/"),
                route(|ctx| Ok(ctx.respond(json!(null)).into())),
            )
            .unwrap_err();
        assert!(matches!(err, HermesError::AlreadyClosed));
        assert!(matches!(adapter.listen(1), Err(HermesError::AlreadyClosed)));
        assert_eq!(
            adapter.call(RouteKey::new(Method::Get, "/"), CallbackData::default()),
            CallbackReply::closed()
        );
    }

    struct NullEngine;

    impl NativeEngine for NullEngine {
        type Instance = ();

        fn create(&self) -> Option<()> {
            None
        }

        fn listen(&self, _instance: &(), _port: u16) -> HermesResult<Option<String>> {
            Ok(None)
        }

        fn free(&self, _instance: ()) {}
    }

    #[test]
    fn test_null_handle_is_native_init() {
        let result = InProcessAdapter::<NullEngine, HostLoop>::new(
            Arc::new(NullEngine),
            BridgeOptions::default(),
        );
        assert!(matches!(result, Err(HermesError::NativeInit(_))));
    }
}
