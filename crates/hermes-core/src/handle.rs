//! Ownership of the opaque native instance.
//!
//! A [`NativeHandle`] owns exactly one engine instance and frees it exactly
//! once: either explicitly through [`NativeHandle::release`], which consumes
//! the handle, or on drop. [`HandleSlot`] is the runtime-checked owner used
//! where the handle must live behind a shared reference; it tracks the
//! `Unallocated → Active → Freed` lifecycle and turns misuse into errors.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bridge::Thunk;
use crate::engine::NativeEngine;
use crate::error::{HermesError, HermesResult};
use crate::route::RouteKey;

/// Move-only owner of one native instance.
pub struct NativeHandle<E: NativeEngine> {
    engine: Arc<E>,
    instance: Option<E::Instance>,
}

impl<E: NativeEngine> NativeHandle<E> {
    /// Creates an instance on `engine`.
    pub fn acquire(engine: Arc<E>) -> HermesResult<Self> {
        let instance = engine
            .create()
            .ok_or_else(|| HermesError::native_init("engine returned a null handle"))?;
        Ok(Self {
            engine,
            instance: Some(instance),
        })
    }

    /// The engine this handle belongs to.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The owned instance.
    pub fn instance(&self) -> HermesResult<&E::Instance> {
        self.instance
            .as_ref()
            .ok_or(HermesError::UseAfterFree { operation: "instance" })
    }

    /// Starts the engine listening on `port`.
    pub fn listen(&self, port: u16) -> HermesResult<Option<String>> {
        let instance = self.instance()?;
        self.engine.listen(instance, port)
    }

    /// Registers a route thunk with the engine.
    pub fn register_route(&self, key: &RouteKey, thunk: Thunk) -> HermesResult<()> {
        let instance = self.instance()?;
        self.engine.register_route(instance, key, thunk)
    }

    /// Frees the instance.
    pub fn release(mut self) {
        self.free();
    }

    fn free(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.engine.free(instance);
        }
    }
}

impl<E: NativeEngine> Drop for NativeHandle<E> {
    fn drop(&mut self) {
        self.free();
    }
}

impl<E: NativeEngine> fmt::Debug for NativeHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("live", &self.instance.is_some())
            .finish()
    }
}

/// Lifecycle state of a [`HandleSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// No handle acquired yet.
    Unallocated,
    /// A handle is live.
    Active,
    /// The handle was released; the slot cannot be reused.
    Freed,
}

enum SlotState<E: NativeEngine> {
    Unallocated,
    Active(NativeHandle<E>),
    Freed,
}

/// Shared, runtime-checked owner of at most one [`NativeHandle`].
pub struct HandleSlot<E: NativeEngine> {
    engine: Arc<E>,
    state: Mutex<SlotState<E>>,
}

impl<E: NativeEngine> HandleSlot<E> {
    /// Creates an empty slot for `engine`.
    #[must_use]
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            state: Mutex::new(SlotState::Unallocated),
        }
    }

    /// The engine handles are acquired from.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Current lifecycle state.
    pub fn status(&self) -> HandleStatus {
        match *self.state.lock() {
            SlotState::Unallocated => HandleStatus::Unallocated,
            SlotState::Active(_) => HandleStatus::Active,
            SlotState::Freed => HandleStatus::Freed,
        }
    }

    /// Acquires the handle. Fails if one is live or the slot was already used.
    pub fn acquire(&self) -> HermesResult<()> {
        let mut state = self.state.lock();
        match &*state {
            SlotState::Unallocated => {}
            SlotState::Active(_) => return Err(HermesError::HandleAlreadyAcquired),
            SlotState::Freed => {
                return Err(HermesError::UseAfterFree {
                    operation: "acquire",
                })
            }
        }
        *state = SlotState::Active(NativeHandle::acquire(Arc::clone(&self.engine))?);
        Ok(())
    }

    /// Runs `f` against the live handle.
    pub fn with<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&NativeHandle<E>) -> HermesResult<R>,
    ) -> HermesResult<R> {
        match &*self.state.lock() {
            SlotState::Active(handle) => f(handle),
            SlotState::Unallocated => Err(HermesError::HandleNotAcquired { operation }),
            SlotState::Freed => Err(HermesError::UseAfterFree { operation }),
        }
    }

    /// Starts the engine listening on `port`.
    pub fn listen(&self, port: u16) -> HermesResult<Option<String>> {
        self.with("listen", |handle| handle.listen(port))
    }

    /// Registers a route thunk with the engine.
    pub fn register_route(&self, key: &RouteKey, thunk: Thunk) -> HermesResult<()> {
        self.with("register_route", |handle| handle.register_route(key, thunk))
    }

    /// Frees the live handle.
    pub fn release(&self) -> HermesResult<()> {
        let handle = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, SlotState::Freed) {
                SlotState::Active(handle) => handle,
                SlotState::Unallocated => {
                    *state = SlotState::Unallocated;
                    return Err(HermesError::HandleNotAcquired {
                        operation: "release",
                    });
                }
                SlotState::Freed => {
                    return Err(HermesError::UseAfterFree {
                        operation: "release",
                    })
                }
            }
        };
        handle.release();
        Ok(())
    }
}

impl<E: NativeEngine> fmt::Debug for HandleSlot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSlot")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
