//! Route registry.
//!
//! Maps a [`RouteKey`] to the callback that answers it. Reads happen on every
//! request from native threads and never take a lock: they load the current
//! snapshot. Writes happen during setup, copy the map, and publish a new
//! snapshot under a mutex so concurrent registrations cannot lose entries.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::context::Context;
use crate::response::Reply;
use crate::route::{Method, RouteKey};

/// A managed-side route callback.
///
/// Returning `Err` (or panicking) is the callback "throwing"; the bridge
/// turns it into a `500` reply.
pub type RouteCallback = Arc<dyn Fn(Context) -> anyhow::Result<Reply> + Send + Sync>;

/// A registered callback plus its invocation counter.
pub struct RouteEntry {
    callback: RouteCallback,
    calls: AtomicU64,
}

impl RouteEntry {
    fn new(callback: RouteCallback) -> Self {
        Self {
            callback,
            calls: AtomicU64::new(0),
        }
    }

    /// Returns the callback, counting the call.
    pub fn callback(&self) -> &RouteCallback {
        self.calls.fetch_add(1, Ordering::Relaxed);
        &self.callback
    }

    /// Number of times the callback has been handed out.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

type RouteMap = HashMap<RouteKey, Arc<RouteEntry>>;

/// Concurrent route table with lock-free lookups.
pub struct RouteRegistry {
    snapshot: ArcSwap<RouteMap>,
    write_lock: Mutex<()>,
}

impl RouteRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Registers a callback. A later registration for the same key replaces
    /// the earlier one.
    pub fn register(&self, key: RouteKey, callback: RouteCallback) {
        let _guard = self.write_lock.lock();
        let mut routes = (**self.snapshot.load()).clone();
        let replaced = routes
            .insert(key.clone(), Arc::new(RouteEntry::new(callback)))
            .is_some();
        self.snapshot.store(Arc::new(routes));

        if replaced {
            tracing::debug!(route = %key, "route callback replaced");
        } else {
            tracing::debug!(route = %key, "route registered");
        }
    }

    /// Looks up the entry for a route key.
    pub fn lookup(&self, key: &RouteKey) -> Option<Arc<RouteEntry>> {
        self.snapshot.load().get(key).cloned()
    }

    /// Looks up a route by method and path.
    pub fn lookup_route(&self, method: Method, path: &str) -> Option<Arc<RouteEntry>> {
        self.lookup(&RouteKey::new(method, path))
    }

    /// Looks up a route from raw strings. An unknown method finds nothing.
    pub fn lookup_raw(&self, method: &str, path: &str) -> Option<Arc<RouteEntry>> {
        let method = method.parse().ok()?;
        self.lookup_route(method, path)
    }

    /// Returns `true` if the key has a callback.
    pub fn contains(&self, key: &RouteKey) -> bool {
        self.snapshot.load().contains_key(key)
    }

    /// Number of registered routes.
    pub fn count(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Returns all registered keys.
    pub fn keys(&self) -> Vec<RouteKey> {
        self.snapshot.load().keys().cloned().collect()
    }

    /// Call counts per route, busiest first. Ties are ordered by route.
    pub fn stats(&self) -> Vec<(RouteKey, u64)> {
        let mut stats: Vec<_> = self
            .snapshot
            .load()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.calls()))
            .collect();
        stats.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.0.path.cmp(&b.0.path))
                .then_with(|| a.0.method.as_str().cmp(b.0.method.as_str()))
        });
        stats
    }

    /// Removes every route.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.snapshot.store(Arc::new(HashMap::new()));
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("routes", &self.count())
            .finish()
    }
}
