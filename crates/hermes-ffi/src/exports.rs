//! Server lifecycle exported over the C ABI
//!
//! A `HermesServer` wraps one [`LoopbackEngine`] instance owned by a
//! [`NativeHandle`]. Routes cannot be registered through this surface; a
//! caller on the far side of the boundary only creates, listens and frees.

use std::ffi::{c_char, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use hermes_core::{HermesResult, LoopbackEngine, NativeHandle};

use crate::error::FfiError;

/// Opaque server handle for FFI
#[repr(C)]
pub struct HermesServer {
    _opaque: [u8; 0],
}

/// Internal server state
pub(crate) struct ServerState {
    handle: NativeHandle<LoopbackEngine>,
}

impl ServerState {
    fn new() -> HermesResult<Self> {
        Ok(Self {
            handle: NativeHandle::acquire(Arc::new(LoopbackEngine::new()))?,
        })
    }
}

/// Runs `f`, turning a panic into `fallback` and a last error.
fn guarded<T>(operation: &'static str, fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        crate::set_last_error(format!("panic during {operation}"));
        fallback
    })
}

/// Create a new server
///
/// Returns a pointer to the server handle, or null on error.
/// Use `hermes_last_error()` to get the error message on failure.
/// The handle must be freed with `hermes_free`.
#[no_mangle]
pub extern "C" fn hermes_create() -> *mut HermesServer {
    guarded("create", ptr::null_mut(), || match ServerState::new() {
        Ok(state) => Box::into_raw(Box::new(state)).cast(),
        Err(e) => {
            crate::set_last_error(e);
            ptr::null_mut()
        }
    })
}

/// Start the server listening on `port`
///
/// # Safety
///
/// - `server` must be a valid pointer returned by `hermes_create` that has
///   not been freed
///
/// Returns a status message owned by the caller, to be released with
/// `hermes_free_string`. Returns null on error, with `hermes_last_error()`
/// set; a null return with no last error means there was no message.
#[no_mangle]
pub unsafe extern "C" fn hermes_listen(server: *mut HermesServer, port: u16) -> *mut c_char {
    crate::clear_last_error();
    if server.is_null() {
        crate::set_last_error(FfiError::NullPointer("server"));
        return ptr::null_mut();
    }

    let state = &*(server as *const ServerState);

    guarded("listen", ptr::null_mut(), || match state.handle.listen(port) {
        Ok(Some(message)) => match CString::new(message) {
            Ok(message) => {
                tracing::debug!(port, "server listening");
                message.into_raw()
            }
            Err(_) => {
                crate::set_last_error(FfiError::InteriorNul);
                ptr::null_mut()
            }
        },
        Ok(None) => ptr::null_mut(),
        Err(e) => {
            crate::set_last_error(e);
            ptr::null_mut()
        }
    })
}

/// Free a server
///
/// # Safety
///
/// - `server` must be a valid pointer returned by `hermes_create`
/// - After calling this, `server` is no longer valid
#[no_mangle]
pub unsafe extern "C" fn hermes_free(server: *mut HermesServer) {
    if server.is_null() {
        return;
    }

    drop(Box::from_raw(server.cast::<ServerState>()));
}

/// Free a string returned by a Hermes function
///
/// # Safety
///
/// - `s` must be a pointer returned by a Hermes function, or null
/// - Each string must be freed exactly once
#[no_mangle]
pub unsafe extern "C" fn hermes_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }

    drop(CString::from_raw(s));
}

/// Get the library version
///
/// The returned string is static and must not be freed.
#[no_mangle]
pub extern "C" fn hermes_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr().cast()
}
