//! The routing capability shared by both interop strategies.

use std::fmt;
use std::sync::Arc;

use hermes_core::{
    CallbackData, CallbackReply, HermesResult, HostLoop, LoopbackEngine, Method, RouteCallback,
    RouteKey, RouteRegistry,
};

use crate::dylib::DylibAdapter;
use crate::in_process::InProcessAdapter;

/// Which interop strategy an adapter uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    /// The engine calls route thunks from its own threads.
    InProcess,
    /// The engine is a shared library reached through C pointers.
    Dylib,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProcess => f.write_str("in-process"),
            Self::Dylib => f.write_str("dylib"),
        }
    }
}

/// Register, listen and close over one native engine instance.
pub trait Adapter: Send + Sync {
    /// The strategy this adapter implements.
    fn kind(&self) -> AdapterKind;

    /// Stores `callback` for `key`, replacing any earlier one.
    fn register_route(&self, key: RouteKey, callback: RouteCallback) -> HermesResult<()>;

    /// Starts the engine. Returns the engine's status message, if any.
    fn listen(&self, port: u16) -> HermesResult<Option<String>>;

    /// Stops callbacks, frees the engine instance and clears the routes.
    /// Calling it again is a no-op.
    fn close(&self) -> HermesResult<()>;

    /// Whether [`close`](Self::close) has run.
    fn is_closed(&self) -> bool;
}

/// The adapter an [`App`](crate::App) runs on, fixed at construction.
#[derive(Debug)]
pub enum AdapterImpl {
    /// In-process engine with the Rust host loop.
    InProcess(InProcessAdapter<LoopbackEngine, HostLoop>),
    /// Engine behind a shared library.
    Dylib(DylibAdapter),
}

impl AdapterImpl {
    /// Sends a request through the adapter's engine, as a client of the
    /// engine would.
    pub async fn inject(&self, method: Method, path: &str, data: CallbackData) -> CallbackReply {
        match self {
            Self::InProcess(adapter) => adapter.inject(method, path, data).await,
            Self::Dylib(adapter) => {
                adapter
                    .dispatch(method.as_str(), path, data.body, data.params)
                    .await
            }
        }
    }

    /// The routes registered through this adapter.
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        match self {
            Self::InProcess(adapter) => adapter.registry(),
            Self::Dylib(adapter) => adapter.registry(),
        }
    }

    fn inner(&self) -> &dyn Adapter {
        match self {
            Self::InProcess(adapter) => adapter,
            Self::Dylib(adapter) => adapter,
        }
    }
}

impl Adapter for AdapterImpl {
    fn kind(&self) -> AdapterKind {
        self.inner().kind()
    }

    fn register_route(&self, key: RouteKey, callback: RouteCallback) -> HermesResult<()> {
        self.inner().register_route(key, callback)
    }

    fn listen(&self, port: u16) -> HermesResult<Option<String>> {
        self.inner().listen(port)
    }

    fn close(&self) -> HermesResult<()> {
        self.inner().close()
    }

    fn is_closed(&self) -> bool {
        self.inner().is_closed()
    }
}

impl From<InProcessAdapter<LoopbackEngine, HostLoop>> for AdapterImpl {
    fn from(adapter: InProcessAdapter<LoopbackEngine, HostLoop>) -> Self {
        Self::InProcess(adapter)
    }
}

impl From<DylibAdapter> for AdapterImpl {
    fn from(adapter: DylibAdapter) -> Self {
        Self::Dylib(adapter)
    }
}
