//! # Hermes Core
//!
//! The boundary between a managed host and a native HTTP engine.
//!
//! - [`RouteRegistry`] - Route callbacks keyed by method and path
//! - [`ContextBuilder`] - Decodes the serialized request into a [`Context`]
//! - [`CallbackBridge`] - Invokes a callback and serializes its [`Response`]
//! - [`HostChannel`] / [`HostLoop`] - Hop from engine threads onto the host
//! - [`NativeHandle`] / [`HandleSlot`] - Exactly-once ownership of the engine instance
//! - [`NativeEngine`] - Contract of the engine, with the in-memory [`LoopbackEngine`]
//! - [`HermesError`] - Standard error types

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bridge;
mod context;
mod engine;
mod error;
mod handle;
mod host;
mod registry;
mod response;
mod route;

pub use bridge::{CallbackBridge, CallbackData, EngineFault, Gate, Thunk, UNMATCHED_ROUTE};
pub use context::{Context, ContextBuilder};
pub use engine::{LoopbackEngine, LoopbackInstance, NativeEngine};
pub use error::{HermesError, HermesResult};
pub use handle::{HandleSlot, HandleStatus, NativeHandle};
pub use host::{BridgeOptions, HostChannel, HostJob, HostLoop, Scheduler};
pub use registry::{RouteCallback, RouteEntry, RouteRegistry};
pub use response::{CallbackReply, Reply, Response, DEFAULT_STATUS, STATUS_RANGE};
pub use route::{Method, RouteKey};
