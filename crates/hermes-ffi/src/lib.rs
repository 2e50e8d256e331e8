//! # Hermes FFI
//!
//! Both sides of the pointer/string boundary.
//!
//! ## Overview
//!
//! - The exported C ABI (`hermes_create`, `hermes_listen`, `hermes_free`,
//!   `hermes_free_string`, `hermes_last_error`, `hermes_version`) lets a host
//!   that can only load shared libraries drive a server instance.
//! - [`DylibEngine`] is the consumer side: it loads such a library with
//!   `libloading` and implements [`hermes_core::NativeEngine`] on top of it.
//!
//! ## Safety
//!
//! All exported functions taking pointers are `unsafe` because they deal with
//! raw pointers from foreign code. The caller is responsible for:
//!
//! - Passing only pointers previously returned by this library
//! - Freeing every handle and string exactly once
//!
//! ## Memory Management
//!
//! - Strings returned FROM Hermes must be freed with `hermes_free_string`
//! - Server handles must be freed with `hermes_free`
//! - The string returned by `hermes_last_error` and `hermes_version` is
//!   borrowed and must not be freed
//!
//! ## Example (C)
//!
//! ```c
//! #include <hermes.h>
//!
//! int main() {
//!     HermesServer *server = hermes_create();
//!     if (server == NULL) {
//!         fprintf(stderr, "%s\n", hermes_last_error());
//!         return 1;
//!     }
//!     char *message = hermes_listen(server, 8080);
//!     if (message != NULL) {
//!         puts(message);
//!         hermes_free_string(message);
//!     }
//!     hermes_free(server);
//!     return 0;
//! }
//! ```

#![allow(unsafe_code)] // FFI requires unsafe
#![allow(clippy::missing_safety_doc)] // Safety docs in module-level

mod api;
mod dylib;
mod error;
mod exports;

pub use api::{
    CreateFn, FreeFn, FreeStringFn, LastErrorFn, ListenFn, NativeApi, NativeString, RawInstance,
};
pub use dylib::{DylibEngine, DEFAULT_SYMBOL_PREFIX};
pub use error::FfiError;
pub use exports::{
    hermes_create, hermes_free, hermes_free_string, hermes_listen, hermes_version, HermesServer,
};

use std::cell::RefCell;
use std::ffi::{c_char, CString};

thread_local! {
    /// Last error message raised on this thread.
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message for the calling thread
pub(crate) fn set_last_error(err: impl std::fmt::Display) {
    let message = err.to_string().replace('\0', " ");
    tracing::debug!(error = %message, "ffi call failed");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = CString::new(message).ok());
}

/// Forget the calling thread's last error
pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Get the last error message raised on the calling thread
///
/// # Safety
///
/// The returned pointer is valid until the next Hermes call on the same
/// thread. The caller must not free this pointer. `hermes_listen` clears the
/// message on entry, so after it returns null a non-null message means the
/// call failed.
#[no_mangle]
pub unsafe extern "C" fn hermes_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(std::ptr::null(), |message| message.as_ptr())
    })
}
