//! The edge of the native engine.
//!
//! [`NativeEngine`] is the fixed contract the boundary layer drives: create an
//! opaque instance, register route thunks on it, start listening, free it.
//! [`LoopbackEngine`] is an in-memory implementation that matches routes by
//! exact key and lets requests be injected without a socket.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::bridge::{CallbackData, EngineFault, Thunk};
use crate::error::{HermesError, HermesResult};
use crate::response::CallbackReply;
use crate::route::{Method, RouteKey};

/// Contract of a native HTTP engine.
pub trait NativeEngine: Send + Sync + 'static {
    /// Opaque instance type.
    type Instance: Send + Sync + 'static;

    /// Creates an instance. `None` means the engine could not allocate one.
    fn create(&self) -> Option<Self::Instance>;

    /// Starts serving on `port`. May return a status message.
    fn listen(&self, instance: &Self::Instance, port: u16) -> HermesResult<Option<String>>;

    /// Registers the thunk the engine calls for requests matching `key`.
    ///
    /// Engines whose boundary cannot carry a callback keep this default.
    fn register_route(
        &self,
        instance: &Self::Instance,
        key: &RouteKey,
        thunk: Thunk,
    ) -> HermesResult<()> {
        let _ = (instance, thunk);
        Err(HermesError::RouteForwardingUnsupported(key.clone()))
    }

    /// Destroys an instance.
    fn free(&self, instance: Self::Instance);
}

/// One instance of the [`LoopbackEngine`].
pub struct LoopbackInstance {
    id: u64,
    routes: DashMap<RouteKey, Thunk>,
    port: Mutex<Option<u16>>,
    freed: AtomicBool,
}

impl LoopbackInstance {
    /// Instance id, unique per engine.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The port passed to `listen`, if any.
    pub fn port(&self) -> Option<u16> {
        *self.port.lock()
    }

    /// Number of routes registered on this instance.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl fmt::Debug for LoopbackInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackInstance")
            .field("id", &self.id)
            .field("routes", &self.routes.len())
            .field("port", &self.port())
            .field("freed", &self.freed.load(Ordering::Acquire))
            .finish()
    }
}

/// In-memory engine.
///
/// Requests enter through [`dispatch`](Self::dispatch) and reach the thunk on
/// the blocking pool, the way a real engine calls in from its own worker
/// threads.
#[derive(Debug, Default)]
pub struct LoopbackEngine {
    current: ArcSwapOption<LoopbackInstance>,
    next_id: AtomicU64,
    created: AtomicUsize,
    freed: AtomicUsize,
}

impl LoopbackEngine {
    /// Creates an engine with no instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    /// Number of instances freed so far.
    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::Acquire)
    }

    /// The live instance, if one exists.
    pub fn current(&self) -> Option<Arc<LoopbackInstance>> {
        self.current.load_full()
    }

    /// Injects a request for `method path`.
    pub async fn dispatch(&self, method: Method, path: &str, data: CallbackData) -> CallbackReply {
        self.dispatch_with(RouteKey::new(method, path), Ok(data))
            .await
    }

    /// Injects a request or an engine fault for `key`.
    ///
    /// Unmatched keys get a `404` without reaching the bridge; a freed or
    /// missing instance gets a `503`.
    pub async fn dispatch_with(
        &self,
        key: RouteKey,
        data: Result<CallbackData, EngineFault>,
    ) -> CallbackReply {
        let Some(instance) = self.current.load_full() else {
            return CallbackReply::closed();
        };
        if instance.freed.load(Ordering::Acquire) {
            return CallbackReply::closed();
        }

        let Some(thunk) = instance.routes.get(&key).map(|entry| Arc::clone(entry.value())) else {
            return CallbackReply::not_found();
        };
        drop(instance);

        match tokio::task::spawn_blocking(move || thunk(data)).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(route = %key, error = %err, "engine worker failed");
                CallbackReply::error(500, "engine worker failed")
            }
        }
    }
}

impl NativeEngine for LoopbackEngine {
    type Instance = Arc<LoopbackInstance>;

    fn create(&self) -> Option<Self::Instance> {
        let instance = Arc::new(LoopbackInstance {
            id: self.next_id.fetch_add(1, Ordering::AcqRel),
            routes: DashMap::new(),
            port: Mutex::new(None),
            freed: AtomicBool::new(false),
        });
        self.current.store(Some(Arc::clone(&instance)));
        self.created.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(instance = instance.id, "loopback instance created");
        Some(instance)
    }

    fn listen(&self, instance: &Self::Instance, port: u16) -> HermesResult<Option<String>> {
        let mut bound = instance.port.lock();
        if let Some(existing) = *bound {
            return Err(HermesError::engine(format!(
                "instance {} already listening on port {existing}",
                instance.id
            )));
        }
        *bound = Some(port);
        Ok(Some(format!("listening on port {port}")))
    }

    fn register_route(
        &self,
        instance: &Self::Instance,
        key: &RouteKey,
        thunk: Thunk,
    ) -> HermesResult<()> {
        instance.routes.insert(key.clone(), thunk);
        Ok(())
    }

    fn free(&self, instance: Self::Instance) {
        if instance.freed.swap(true, Ordering::AcqRel) {
            tracing::warn!(instance = instance.id, "loopback instance freed twice");
            return;
        }
        instance.routes.clear();

        let is_current = self
            .current
            .load()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &instance));
        if is_current {
            self.current.store(None);
        }

        self.freed.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(instance = instance.id, "loopback instance freed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_thunk(status: u16) -> Thunk {
        Arc::new(move |data| match data {
            Ok(data) => CallbackReply {
                data: data.body.unwrap_or_else(|| "null".to_string()),
                status,
            },
            Err(fault) => CallbackReply::error(500, &fault.to_string()),
        })
    }

    #[tokio::test]
    async fn test_dispatch_exact_match() {
        let engine = LoopbackEngine::new();
        let instance = engine.create().unwrap();
        engine
            .register_route(&instance, &RouteKey::new(Method::Post, "/echo"), echo_thunk(201))
            .unwrap();

        let reply = engine
            .dispatch(
                Method::Post,
                "/echo",
                CallbackData::new(Some("[1]".to_string()), None),
            )
            .await;
        assert_eq!(reply.status, 201);
        assert_eq!(reply.data, "[1]");

        let reply = engine
            .dispatch(Method::Get, "/echo", CallbackData::default())
            .await;
        assert_eq!(reply, CallbackReply::not_found());
    }

    #[tokio::test]
    async fn test_dispatch_without_instance() {
        let engine = LoopbackEngine::new();
        let reply = engine.dispatch(Method::Get, "/", CallbackData::default()).await;
        assert_eq!(reply, CallbackReply::closed());
    }

    #[tokio::test]
    async fn test_dispatch_after_free() {
        let engine = LoopbackEngine::new();
        let instance = engine.create().unwrap();
        engine
            .register_route(&instance, &RouteKey::new(Method::Get, "/"), echo_thunk(200))
            .unwrap();
        engine.free(instance);

        let reply = engine.dispatch(Method::Get, "/", CallbackData::default()).await;
        assert_eq!(reply, CallbackReply::closed());
        assert!(engine.current().is_none());
    }

    #[tokio::test]
    async fn test_dispatch_fault() {
        let engine = LoopbackEngine::new();
        let instance = engine.create().unwrap();
        let key = RouteKey::new(Method::Get, "/");
        engine.register_route(&instance, &key, echo_thunk(200)).unwrap();

        let reply = engine
            .dispatch_with(key, Err(EngineFault::new("bad frame")))
            .await;
        assert_eq!(reply.status, 500);
    }

    #[test]
    fn test_listen_once() {
        let engine = LoopbackEngine::new();
        let instance = engine.create().unwrap();
        assert_eq!(
            engine.listen(&instance, 8080).unwrap().as_deref(),
            Some("listening on port 8080")
        );
        assert_eq!(instance.port(), Some(8080));
        assert!(engine.listen(&instance, 8081).is_err());
    }

    #[test]
    fn test_free_counts_once() {
        let engine = LoopbackEngine::new();
        let instance = engine.create().unwrap();
        engine.free(Arc::clone(&instance));
        engine.free(instance);
        assert_eq!(engine.created(), 1);
        assert_eq!(engine.freed(), 1);
    }

    struct Forwardless;

    impl NativeEngine for Forwardless {
        type Instance = ();

        fn create(&self) -> Option<()> {
            Some(())
        }

        fn listen(&self, _instance: &(), _port: u16) -> HermesResult<Option<String>> {
            Ok(None)
        }

        fn free(&self, _instance: ()) {}
    }

    #[test]
    fn test_default_register_route_is_unsupported() {
        let key = RouteKey::new(Method::Get, "/x");
        let err = Forwardless
            .register_route(&(), &key, echo_thunk(200))
            .unwrap_err();
        assert!(matches!(err, HermesError::RouteForwardingUnsupported(k) if k == key));
    }
}
