//! Shared-library strategy: the engine is reached only through C pointers.
//!
//! Route registration cannot cross this boundary. Routes are recorded in the
//! registry and a warning is logged; requests are served by
//! [`DylibAdapter::dispatch`], which resolves raw method and path strings on
//! the managed side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hermes_config::NativeConfig;
use hermes_core::{
    CallbackBridge, CallbackData, CallbackReply, HandleSlot, HandleStatus, HermesError,
    HermesResult, RouteCallback, RouteKey, RouteRegistry,
};
use hermes_ffi::DylibEngine;

use crate::adapter::{Adapter, AdapterKind};

/// Adapter over a [`DylibEngine`].
pub struct DylibAdapter {
    registry: Arc<RouteRegistry>,
    bridge: CallbackBridge,
    slot: HandleSlot<DylibEngine>,
    listening: AtomicBool,
}

impl DylibAdapter {
    /// Acquires an engine instance through `engine`.
    ///
    /// # Errors
    ///
    /// Returns `NativeInit` if `<prefix>_create` returns null.
    pub fn new(engine: DylibEngine) -> HermesResult<Self> {
        let registry = Arc::new(RouteRegistry::new());
        let bridge = CallbackBridge::new(Arc::clone(&registry));
        let slot = HandleSlot::new(Arc::new(engine));
        slot.acquire()?;

        tracing::debug!(origin = slot.engine().origin(), "dylib engine acquired");
        Ok(Self {
            registry,
            bridge,
            slot,
            listening: AtomicBool::new(false),
        })
    }

    /// Loads the configured library, or uses the statically linked exports
    /// when no path is set.
    ///
    /// # Errors
    ///
    /// Returns `NativeInit` if the library or one of its symbols cannot be
    /// loaded.
    pub fn from_config(config: &NativeConfig) -> HermesResult<Self> {
        let engine = match &config.library_path {
            Some(path) => DylibEngine::open(path, &config.symbol_prefix)?,
            None => DylibEngine::linked(),
        };
        Self::new(engine)
    }

    /// The routes registered so far.
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// The loaded engine.
    pub fn engine(&self) -> &Arc<DylibEngine> {
        self.slot.engine()
    }

    /// Lifecycle state of the engine handle.
    pub fn handle_status(&self) -> HandleStatus {
        self.slot.status()
    }

    /// Answers a request given as raw strings.
    ///
    /// An unsupported method is answered like an unmatched path.
    pub async fn dispatch(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
        params: Option<String>,
    ) -> CallbackReply {
        let Ok(key) = RouteKey::parse(method, path) else {
            return CallbackReply::not_found();
        };
        self.bridge
            .invoke(&key, &CallbackData::new(body, params))
            .await
    }
}

impl Adapter for DylibAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Dylib
    }

    fn register_route(&self, key: RouteKey, callback: RouteCallback) -> HermesResult<()> {
        if self.bridge.is_closed() {
            return Err(HermesError::AlreadyClosed);
        }

        self.registry.register(key.clone(), callback);
        match self.slot.register_route(&key, no_thunk()) {
            Ok(()) => Ok(()),
            Err(HermesError::RouteForwardingUnsupported(_)) => {
                tracing::warn!(route = %key, "route recorded but not forwarded to the native engine");
                Ok(())
            }
            Err(err) => Err(err),
        }
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
                if let Some(message) = &message {
                    tracing::info!(port, engine_message = %message, "native engine listening");
                } else {
                    tracing::info!(port, "native engine listening");
                }
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

        self.slot.release()?;
        self.registry.clear();
        tracing::info!("dylib adapter closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.bridge.is_closed()
    }
}

impl std::fmt::Debug for DylibAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DylibAdapter")
            .field("engine", self.slot.engine())
            .field("routes", &self.registry.count())
            .field("handle", &self.slot.status())
            .field("closed", &self.bridge.is_closed())
            .finish_non_exhaustive()
    }
}

// The pointer ABI has no slot for a thunk; this one is never called.
fn no_thunk() -> hermes_core::Thunk {
    Arc::new(|_| CallbackReply::error(501, "route forwarding is not supported"))
}
