//! Hop from native worker threads onto the managed host.
//!
//! The native engine calls a [`Thunk`] on one of its own threads. Route
//! callbacks may only run where the host allows them, so the thunk packages
//! the request as a [`HostJob`], hands it to a [`Scheduler`] and blocks on a
//! one-shot reply channel until the host has answered.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::LocalSet;

use crate::bridge::{CallbackBridge, CallbackData, EngineFault, Thunk};
use crate::error::{HermesError, HermesResult};
use crate::response::CallbackReply;
use crate::route::RouteKey;

/// Options for the native-to-host hop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeOptions {
    /// How long a native thread waits for a reply. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl BridgeOptions {
    /// Options with a reply timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// One request travelling to the host, with the channel its reply goes back on.
#[derive(Debug)]
pub struct HostJob {
    /// The matched route.
    pub key: RouteKey,
    /// The serialized request, or the fault the engine reported instead.
    pub data: Result<CallbackData, EngineFault>,
    reply: Sender<CallbackReply>,
}

impl HostJob {
    /// Creates a job and the receiver its reply will arrive on.
    #[must_use]
    pub fn new(
        key: RouteKey,
        data: Result<CallbackData, EngineFault>,
    ) -> (Self, Receiver<CallbackReply>) {
        let (reply, rx) = bounded(1);
        (Self { key, data, reply }, rx)
    }

    /// Runs the job through the bridge and sends the reply.
    pub async fn run(self, bridge: &CallbackBridge) {
        let reply = bridge.invoke_with(&self.key, self.data).await;
        // The native side may have stopped waiting.
        let _ = self.reply.send(reply);
    }
}

/// Runs [`HostJob`]s on the managed host.
pub trait Scheduler: Send + Sync + 'static {
    /// Starts a scheduler serving `bridge`.
    fn start(bridge: Arc<CallbackBridge>) -> HermesResult<Self>
    where
        Self: Sized;

    /// Queues a job. Hands the job back if the scheduler no longer accepts work.
    fn schedule(&self, job: HostJob) -> Result<(), HostJob>;

    /// Stops accepting jobs. Must not wait for running jobs.
    fn shutdown(&self);
}

/// A host made of one dedicated thread running a single-threaded runtime.
///
/// Jobs run as local tasks, so a callback awaiting a pending reply does not
/// hold up other jobs. After [`shutdown`](Scheduler::shutdown) the thread
/// finishes the tasks it already started and then exits.
#[derive(Debug)]
pub struct HostLoop {
    sender: Mutex<Option<mpsc::UnboundedSender<HostJob>>>,
}

impl Scheduler for HostLoop {
    fn start(bridge: Arc<CallbackBridge>) -> HermesResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| HermesError::native_init(format!("host runtime: {e}")))?;

        let (sender, mut receiver) = mpsc::unbounded_channel::<HostJob>();

        thread::Builder::new()
            .name("hermes-host".to_string())
            .spawn(move || {
                let local = LocalSet::new();
                local.spawn_local(async move {
                    while let Some(job) = receiver.recv().await {
                        let bridge = Arc::clone(&bridge);
                        tokio::task::spawn_local(async move { job.run(&bridge).await });
                    }
                });
                runtime.block_on(local);
                tracing::debug!("host loop stopped");
            })
            .map_err(|e| HermesError::native_init(format!("host thread: {e}")))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
        })
    }

    fn schedule(&self, job: HostJob) -> Result<(), HostJob> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(job).map_err(|e| e.0),
            None => Err(job),
        }
    }

    fn shutdown(&self) {
        self.sender.lock().take();
    }
}

/// The native-thread end of the hop.
pub struct HostChannel<S> {
    scheduler: Arc<S>,
    timeout: Option<Duration>,
}

impl<S: Scheduler> HostChannel<S> {
    /// Creates a channel onto `scheduler`.
    #[must_use]
    pub fn new(scheduler: Arc<S>, options: BridgeOptions) -> Self {
        Self {
            scheduler,
            timeout: options.timeout,
        }
    }

    /// The scheduler jobs are sent to.
    pub fn scheduler(&self) -> &Arc<S> {
        &self.scheduler
    }

    /// Sends one request to the host and blocks until it is answered.
    ///
    /// Must be called from a native thread, never from the host itself.
    pub fn call(&self, key: RouteKey, data: Result<CallbackData, EngineFault>) -> CallbackReply {
        let (job, reply) = HostJob::new(key, data);

        if let Err(job) = self.scheduler.schedule(job) {
            tracing::debug!(route = %job.key, "host no longer accepts jobs");
            return CallbackReply::closed();
        }

        let received = match self.timeout {
            Some(timeout) => reply.recv_timeout(timeout),
            None => reply.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(timeout_ms = ?self.timeout.map(|t| t.as_millis()), "host did not answer in time");
                CallbackReply::timeout()
            }
            Err(RecvTimeoutError::Disconnected) => CallbackReply::closed(),
        }
    }

    /// Builds the thunk the native engine calls for `key`.
    pub fn thunk(self: &Arc<Self>, key: RouteKey) -> Thunk {
        let channel = Arc::clone(self);
        Arc::new(move |data| channel.call(key.clone(), data))
    }
}

impl<S> std::fmt::Debug for HostChannel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostChannel")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RouteCallback, RouteRegistry};
    use crate::response::{Reply, Response};
    use crate::route::Method;
    use crate::Context;
    use serde_json::json;

    fn route<F>(f: F) -> RouteCallback
    where
        F: Fn(Context) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn setup(
        key: &RouteKey,
        callback: RouteCallback,
        options: BridgeOptions,
    ) -> (Arc<CallbackBridge>, Arc<HostChannel<HostLoop>>) {
        let registry = Arc::new(RouteRegistry::new());
        registry.register(key.clone(), callback);
        let bridge = Arc::new(CallbackBridge::new(registry));
        let host = Arc::new(HostLoop::start(Arc::clone(&bridge)).unwrap());
        (bridge, Arc::new(HostChannel::new(host, options)))
    }

    #[test]
    fn test_call_round_trip() {
        let key = RouteKey::new(Method::Post, "/data");
        let (_bridge, channel) = setup(
            &key,
            route(|ctx| Ok(ctx.respond_with_status(json!({ "received": ctx.body }), 201).into())),
            BridgeOptions::default(),
        );

        let thunk = channel.thunk(key);
        let reply = thunk(Ok(CallbackData::new(Some(r#"{"x":1}"#.to_string()), None)));
        assert_eq!(reply.status, 201);
        assert_eq!(reply.json().unwrap(), json!({"received": {"x": 1}}));
    }

    #[test]
    fn test_call_from_many_threads() {
        let key = RouteKey::new(Method::Get, "/n");
        let (_bridge, channel) = setup(
            &key,
            route(|ctx| Ok(ctx.respond(json!(ctx.param("n"))).into())),
            BridgeOptions::default(),
        );

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let thunk = channel.thunk(key.clone());
                thread::spawn(move || {
                    let params = json!({ "n": n.to_string() }).to_string();
                    let reply = thunk(Ok(CallbackData::new(None, Some(params))));
                    assert_eq!(reply.json().unwrap(), json!(n.to_string()));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_pending_reply_does_not_block_host() {
        let slow = RouteKey::new(Method::Get, "/slow");
        let registry = Arc::new(RouteRegistry::new());
        registry.register(
            slow.clone(),
            route(|_| {
                Ok(Reply::pending(async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(Response::new(json!("slow")).into())
                }))
            }),
        );
        let fast = RouteKey::new(Method::Get, "/fast");
        registry.register(fast.clone(), route(|ctx| Ok(ctx.respond(json!("fast")).into())));

        let bridge = Arc::new(CallbackBridge::new(registry));
        let host = Arc::new(HostLoop::start(bridge).unwrap());
        let channel = Arc::new(HostChannel::new(host, BridgeOptions::default()));

        let slow_thunk = channel.thunk(slow);
        let slow_call = thread::spawn(move || slow_thunk(Ok(CallbackData::default())));
        thread::sleep(Duration::from_millis(20));

        let started = std::time::Instant::now();
        let reply = channel.call(fast, Ok(CallbackData::default()));
        assert_eq!(reply.data, "\"fast\"");
        assert!(started.elapsed() < Duration::from_millis(150));

        assert_eq!(slow_call.join().unwrap().data, "\"slow\"");
    }

    #[test]
    fn test_call_times_out() {
        let key = RouteKey::new(Method::Get, "/hang");
        let (_bridge, channel) = setup(
            &key,
            route(|_| Ok(Reply::pending(std::future::pending()))),
            BridgeOptions::with_timeout(Duration::from_millis(50)),
        );

        let reply = channel.call(key, Ok(CallbackData::default()));
        assert_eq!(reply, CallbackReply::timeout());
    }

    #[test]
    fn test_call_after_shutdown() {
        let key = RouteKey::new(Method::Get, "/x");
        let (bridge, channel) = setup(
            &key,
            route(|ctx| Ok(ctx.respond(json!(1)).into())),
            BridgeOptions::default(),
        );

        bridge.close();
        assert_eq!(
            channel.call(key.clone(), Ok(CallbackData::default())),
            CallbackReply::closed()
        );

        channel.scheduler().shutdown();
        assert_eq!(
            channel.call(key, Ok(CallbackData::default())),
            CallbackReply::closed()
        );
    }

    #[test]
    fn test_engine_fault_is_answered() {
        let key = RouteKey::new(Method::Get, "/x");
        let (_bridge, channel) = setup(
            &key,
            route(|_| panic!("must not be called")),
            BridgeOptions::default(),
        );

        let reply = channel.call(key, Err(EngineFault::new("torn read")));
        assert_eq!(reply.status, 500);
    }
}
