//! # Hermes
//!
//! One routing API over a native HTTP engine, whichever way the engine is
//! reached from the managed host:
//!
//! - **In-process** - the engine calls a thunk per matched request from its
//!   own worker threads; the thunk hops onto the host loop, runs the callback
//!   and hands the serialized reply back.
//! - **Dylib** - the engine is a shared library reached through C pointers;
//!   only the handle lifecycle and `listen` cross the boundary.
//!
//! The strategy is picked once from the detected [`Runtime`] and never changes
//! for the life of an [`App`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hermes::App;
//! use serde_json::json;
//!
//! fn main() -> hermes::AppResult<()> {
//!     let app = App::create()?;
//!     app.get("/hello/:name", |ctx| {
//!         let name = ctx.param("name").unwrap_or("world").to_string();
//!         Ok(ctx.respond(json!({ "message": format!("Hello, {name}!") })))
//!     })?;
//!     app.listen(3000)?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hermes/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod adapter;
mod app;
mod dylib;
mod error;
mod in_process;
mod runtime;

pub use adapter::{Adapter, AdapterImpl, AdapterKind};
pub use app::{App, ENV_PREFIX};
pub use dylib::DylibAdapter;
pub use error::{AppError, AppResult};
pub use in_process::InProcessAdapter;
pub use runtime::Runtime;

// Re-export core types
pub use hermes_core as core;

// Re-export configuration types
pub use hermes_config as config;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{Adapter, App, AppError, AppResult, Runtime};
    pub use hermes_core::{CallbackReply, Context, Method, Reply, Response};
}
