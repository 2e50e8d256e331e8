//! Host scheduling on the napi tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hermes_core::{CallbackBridge, HermesResult, HostJob, Scheduler};

/// Runs bridge invocations on the runtime napi drives for async methods.
///
/// Callbacks themselves execute on the JavaScript thread: the bridge calls
/// a ThreadsafeFunction and awaits its result, so an engine worker never
/// touches the event loop directly.
#[derive(Debug)]
pub struct NapiScheduler {
    bridge: Arc<CallbackBridge>,
    open: AtomicBool,
}

impl Scheduler for NapiScheduler {
    fn start(bridge: Arc<CallbackBridge>) -> HermesResult<Self> {
        Ok(Self {
            bridge,
            open: AtomicBool::new(true),
        })
    }

    fn schedule(&self, job: HostJob) -> Result<(), HostJob> {
        if !self.open.load(Ordering::Acquire) {
            return Err(job);
        }
        let bridge = Arc::clone(&self.bridge);
        napi::bindgen_prelude::spawn(async move { job.run(&bridge).await });
        Ok(())
    }

    fn shutdown(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::debug!("napi scheduler stopped accepting jobs");
        }
    }
}
