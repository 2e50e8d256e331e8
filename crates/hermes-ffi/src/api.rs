//! The consumer side of the C ABI
//!
//! [`NativeApi`] is the table of boundary functions a managed caller resolves
//! from an engine library. [`NativeString`] and [`RawInstance`] wrap the raw
//! pointers that cross it so that application code never touches them.

use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr};
use std::fmt;
use std::ptr::NonNull;

/// `<prefix>_create`
pub type CreateFn = unsafe extern "C" fn() -> *mut c_void;
/// `<prefix>_listen`
pub type ListenFn = unsafe extern "C" fn(*mut c_void, u16) -> *mut c_char;
/// `<prefix>_free`
pub type FreeFn = unsafe extern "C" fn(*mut c_void);
/// `<prefix>_free_string`
pub type FreeStringFn = unsafe extern "C" fn(*mut c_char);
/// `<prefix>_last_error`
pub type LastErrorFn = unsafe extern "C" fn() -> *const c_char;

/// Boundary functions of one engine library.
#[derive(Debug, Clone, Copy)]
pub struct NativeApi {
    /// Allocates an instance; null on failure.
    pub create: CreateFn,
    /// Starts an instance listening; returns an owned string or null.
    pub listen: ListenFn,
    /// Destroys an instance.
    pub free: FreeFn,
    /// Releases a string returned by `listen`.
    pub free_string: FreeStringFn,
    /// Borrowed message of the last failed call on this thread, if the
    /// library reports one.
    pub last_error: Option<LastErrorFn>,
}

impl NativeApi {
    /// The exports of this crate, called directly instead of through a
    /// loaded library.
    #[must_use]
    pub fn linked() -> Self {
        Self {
            create: linked::create,
            listen: linked::listen,
            free: linked::free,
            free_string: linked::free_string,
            last_error: Some(linked::last_error),
        }
    }

    /// Copies out the library's last error message, if it has one.
    pub fn last_error_message(&self) -> Option<String> {
        let last_error = self.last_error?;
        // SAFETY: `last_error` returns null or a borrowed NUL-terminated
        // string that stays valid until the next call on this thread.
        unsafe {
            let ptr = last_error();
            (!ptr.is_null()).then(|| CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }
}

mod linked {
    use std::ffi::{c_char, c_void};

    use crate::exports::{self, HermesServer};

    pub unsafe extern "C" fn create() -> *mut c_void {
        exports::hermes_create().cast()
    }

    pub unsafe extern "C" fn listen(server: *mut c_void, port: u16) -> *mut c_char {
        exports::hermes_listen(server.cast::<HermesServer>(), port)
    }

    pub unsafe extern "C" fn free(server: *mut c_void) {
        exports::hermes_free(server.cast::<HermesServer>());
    }

    pub unsafe extern "C" fn free_string(s: *mut c_char) {
        exports::hermes_free_string(s);
    }

    pub unsafe extern "C" fn last_error() -> *const c_char {
        crate::hermes_last_error()
    }
}

/// A string allocated by the engine library.
///
/// Released through the library's `free_string` exactly once, when dropped
/// or consumed by [`into_string`](Self::into_string).
pub struct NativeString {
    ptr: NonNull<c_char>,
    free_string: FreeStringFn,
}

impl NativeString {
    /// Takes ownership of a string returned across the boundary. Returns
    /// `None` for null.
    ///
    /// # Safety
    ///
    /// - `ptr` must be null or a NUL-terminated string that `free_string`
    ///   releases
    /// - nothing else may release `ptr`
    pub unsafe fn from_raw(ptr: *mut c_char, free_string: FreeStringFn) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, free_string })
    }

    /// Borrows the contents, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        // SAFETY: `from_raw` requires a valid NUL-terminated string that
        // stays alive until `self` is dropped.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }.to_string_lossy()
    }

    /// Copies the contents out and releases the native string.
    pub fn into_string(self) -> String {
        self.to_string_lossy().into_owned()
    }
}

impl Drop for NativeString {
    fn drop(&mut self) {
        // SAFETY: ownership was transferred in `from_raw` and `drop` runs once.
        unsafe { (self.free_string)(self.ptr.as_ptr()) };
    }
}

impl fmt::Debug for NativeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeString")
            .field(&self.to_string_lossy())
            .finish()
    }
}

/// A non-null instance pointer returned by `create`.
#[derive(Debug)]
pub struct RawInstance(NonNull<c_void>);

impl RawInstance {
    /// Wraps a pointer returned by `create`. Returns `None` for null.
    #[must_use]
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// The raw pointer, for passing back across the boundary.
    #[must_use]
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

// SAFETY: the pointer is opaque on this side and only ever handed back to the
// library that produced it, which owns any synchronization it needs.
unsafe impl Send for RawInstance {}
// SAFETY: see `Send`.
unsafe impl Sync for RawInstance {}
