//! # Hermes for Node.js
//!
//! Native bindings that let Node.js and Bun register route callbacks with the
//! Hermes engine.
//!
//! ```typescript
//! import { App, respond } from '@hermes/node';
//!
//! const app = new App({ timeoutMs: 30_000 });
//!
//! app.get('/hello/:name', (ctx) => respond({ message: `Hello, ${ctx.params.name}!` }));
//! app.post('/data', async (ctx) => respond({ received: ctx.body }, 201));
//!
//! app.listen(3000, () => console.log(`running on ${app.currentRuntime()}`));
//! ```
//!
//! Each callback is wrapped in a ThreadsafeFunction. Engine threads hand the
//! request to the bridge, which calls back into the JavaScript thread and
//! waits for the returned value or Promise.

// NAPI-RS has specific patterns that conflict with some clippy lints
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)] // napi async is required for JS Promise
#![allow(clippy::use_self)] // napi derives don't work with Self

use napi_derive::napi;
use serde_json::Value;

mod app;
mod callback;
mod error;
mod scheduler;

pub use app::{App, AppOptions, InjectReply, RouteStat};
pub use callback::{context_value, reply_from_js, route_callback, JsRoute};
pub use error::to_napi_error;
pub use scheduler::NapiScheduler;

/// Build a `{ data, status }` response. `status` defaults to 200.
#[napi]
pub fn respond(data: Value, status: Option<u32>) -> Value {
    callback::response_value(data, status)
}

/// Package version
#[napi]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
