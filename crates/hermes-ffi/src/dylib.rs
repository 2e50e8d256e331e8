//! Engine behind a shared library

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use hermes_core::{HermesError, HermesResult, NativeEngine};
use libloading::Library;

use crate::api::{NativeApi, NativeString, RawInstance};
use crate::error::FfiError;

/// Default symbol prefix of an engine library.
pub const DEFAULT_SYMBOL_PREFIX: &str = "hermes";

/// A [`NativeEngine`] reached through a [`NativeApi`].
///
/// Route thunks cannot cross this boundary, so `register_route` keeps the
/// trait's default and reports the route as not forwarded.
pub struct DylibEngine {
    api: NativeApi,
    origin: String,
    // Keeps the resolved function pointers valid.
    _library: Option<Arc<Library>>,
}

impl DylibEngine {
    /// Loads an engine library and resolves `<prefix>_create`,
    /// `<prefix>_listen`, `<prefix>_free` and `<prefix>_free_string`.
    /// `<prefix>_last_error` is used when the library exports it.
    pub fn open(path: impl AsRef<Path>, prefix: &str) -> HermesResult<Self> {
        let path = path.as_ref();

        // SAFETY: loading runs the library's initializers. The library is
        // configured by the application as a Hermes engine.
        let library = unsafe { Library::new(path) }.map_err(|e| FfiError::LibraryLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        // SAFETY: the symbol types match the C declarations in hermes.h.
        let api = unsafe {
            NativeApi {
                create: symbol(&library, prefix, "create")?,
                listen: symbol(&library, prefix, "listen")?,
                free: symbol(&library, prefix, "free")?,
                free_string: symbol(&library, prefix, "free_string")?,
                last_error: symbol(&library, prefix, "last_error").ok(),
            }
        };

        tracing::debug!(
            path = %path.display(),
            prefix,
            reports_errors = api.last_error.is_some(),
            "engine library loaded"
        );

        Ok(Self {
            api,
            origin: path.display().to_string(),
            _library: Some(Arc::new(library)),
        })
    }

    /// Uses an already resolved function table.
    #[must_use]
    pub fn from_api(api: NativeApi) -> Self {
        Self {
            api,
            origin: "<linked>".to_string(),
            _library: None,
        }
    }

    /// The engine exported by this crate, without loading a library.
    #[must_use]
    pub fn linked() -> Self {
        Self::from_api(NativeApi::linked())
    }

    /// The resolved function table.
    pub fn api(&self) -> NativeApi {
        self.api
    }

    /// Where the engine was loaded from.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

unsafe fn symbol<T: Copy>(library: &Library, prefix: &str, name: &str) -> Result<T, FfiError> {
    let full = format!("{prefix}_{name}");
    library
        .get::<T>(full.as_bytes())
        .map(|sym| *sym)
        .map_err(|_| FfiError::MissingSymbol(full))
}

impl NativeEngine for DylibEngine {
    type Instance = RawInstance;

    fn create(&self) -> Option<RawInstance> {
        // SAFETY: `create` takes no arguments and returns an owned pointer or null.
        RawInstance::new(unsafe { (self.api.create)() })
    }

    fn listen(&self, instance: &RawInstance, port: u16) -> HermesResult<Option<String>> {
        // SAFETY: `instance` came from `create` and has not been freed; the
        // handle that owns it is still alive.
        let message = unsafe {
            let raw = (self.api.listen)(instance.as_ptr(), port);
            NativeString::from_raw(raw, self.api.free_string)
        };
        match message {
            Some(message) => Ok(Some(message.into_string())),
            // Null is either "no message" or a failure the library reports
            // through its last error.
            None => match self.api.last_error_message() {
                Some(error) => Err(HermesError::engine(error)),
                None => Ok(None),
            },
        }
    }

    fn free(&self, instance: RawInstance) {
        // SAFETY: `instance` is consumed, so it is freed at most once.
        unsafe { (self.api.free)(instance.as_ptr()) };
    }
}

impl fmt::Debug for DylibEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DylibEngine")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
