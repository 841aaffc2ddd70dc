//! Watchers: live subscriptions pushing resource updates to a connection.
//!
//! A resource that starts pushing updates returns a [`WatcherHandle`] and
//! registers it in the connection's [`WatcherRegistry`] under the
//! [`SubscriptionKey`] of the watch parameters. The handle is shared
//! (`Arc`) between the resource and the registry; either side may dispose
//! it and disposal runs the cancellation action at most once.
//!
//! The registry never holds a dangling handle: handles are only removed
//! together with their disposal, and once the owning connection is torn
//! down every later registration is disposed on arrival.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::domain::value_objects::SubscriptionKey;

type DisposeFn = Box<dyn FnOnce() + Send + 'static>;

/// Disposable token for one live subscription.
pub struct WatcherHandle {
    action: Mutex<Option<DisposeFn>>,
    disposed: AtomicBool,
}

impl WatcherHandle {
    /// Create a handle that runs `on_dispose` the first time it is disposed.
    pub fn new(on_dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(on_dispose))),
            disposed: AtomicBool::new(false),
        }
    }

    /// Create a handle that aborts a spawned producer task on dispose.
    pub fn for_task<T: Send + 'static>(task: JoinHandle<T>) -> Self {
        let abort = task.abort_handle();
        Self::new(move || abort.abort())
    }

    /// Shorthand for `Arc::new(WatcherHandle::new(..))`.
    pub fn shared(on_dispose: impl FnOnce() + Send + 'static) -> Arc<Self> {
        Arc::new(Self::new(on_dispose))
    }

    /// Stop future pushes for this subscription. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    watchers: HashMap<SubscriptionKey, Vec<Arc<WatcherHandle>>>,
    closed: bool,
}

/// Per-connection mapping from subscription key to its active watchers.
#[derive(Default)]
pub struct WatcherRegistry {
    inner: Mutex<RegistryInner>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a watcher under `key`, creating the entry if absent.
    ///
    /// A `None` handle (a watch that failed to fully register) still
    /// creates the entry so a later unsubscribe reports it as present.
    /// Returns `false` when the registry is already closed, in which case
    /// the handle is disposed immediately.
    pub fn add(&self, key: SubscriptionKey, handle: Option<Arc<WatcherHandle>>) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            drop(inner);
            if let Some(handle) = handle {
                handle.dispose();
            }
            return false;
        }
        let entry = inner.watchers.entry(key).or_default();
        if let Some(handle) = handle {
            entry.push(handle);
        }
        true
    }

    /// [`add`](Self::add) keyed by the canonical form of `params`.
    pub fn add_for_params(&self, params: &Value, handle: Option<Arc<WatcherHandle>>) -> bool {
        self.add(SubscriptionKey::from_params(params), handle)
    }

    /// Dispose every watcher under `key` and erase the key.
    ///
    /// Returns whether anything was registered under it.
    pub fn remove_by_key(&self, key: &SubscriptionKey) -> bool {
        let removed = self.inner.lock().watchers.remove(key);
        match removed {
            Some(handles) => {
                handles.iter().for_each(|handle| handle.dispose());
                true
            }
            None => false,
        }
    }

    /// [`remove_by_key`](Self::remove_by_key) keyed by the canonical form of `params`.
    pub fn remove_for_params(&self, params: &Value) -> bool {
        self.remove_by_key(&SubscriptionKey::from_params(params))
    }

    /// Dispose every watcher under every key, clear the registry and close
    /// it to further registrations. Returns the number of handles disposed.
    pub fn remove_all(&self) -> usize {
        let drained = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.watchers)
        };
        let mut disposed = 0;
        for handle in drained.into_values().flatten() {
            handle.dispose();
            disposed += 1;
        }
        disposed
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.inner.lock().watchers.contains_key(key)
    }

    /// Number of subscription keys currently registered
    pub fn len(&self) -> usize {
        self.inner.lock().watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().watchers.is_empty()
    }

    /// Total number of handles across all keys
    pub fn handle_count(&self) -> usize {
        self.inner.lock().watchers.values().map(Vec::len).sum()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("WatcherRegistry")
            .field("keys", &inner.watchers.len())
            .field("closed", &inner.closed)
            .finish()
    }
}
