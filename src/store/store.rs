use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use super::options::StoreOptions;
use super::subscription::{SubscriberId, Subscription};
use crate::diagnostics;
use crate::error::SubscriberPanic;
use crate::key::{Key, KeyId};
use crate::scheduler::{Scheduler, TimerHandle};

type Value = Arc<dyn Any + Send + Sync>;
type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

struct PendingCleanup {
    epoch: u64,
    timer: TimerHandle,
}

/// All mutable state of a store, guarded by a single lock.
///
/// A key has a `pending_cleanup` entry only while it holds a value and has
/// no subscribers, and never more than one.
#[derive(Default)]
struct StoreState {
    values: HashMap<KeyId, Value>,
    subscribers: HashMap<KeyId, HashMap<SubscriberId, Callback>>,
    pending_cleanup: HashMap<KeyId, PendingCleanup>,
    next_subscriber: u64,
    next_epoch: u64,
}

impl StoreState {
    fn snapshot(&self, key: &KeyId) -> Vec<Callback> {
        self.subscribers
            .get(key)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }
}

pub(crate) struct StoreInner {
    state: Mutex<StoreState>,
    cleanup_timeout: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        for (_, pending) in self.state.get_mut().pending_cleanup.drain() {
            self.scheduler.cancel(pending.timer);
        }
    }
}

/// A keyed store of shared values with change notification.
///
/// Values are held as `Arc<T>`. Writing the very same `Arc` that is already
/// stored is a no-op; any other write replaces the value and synchronously
/// notifies the key's subscribers before [`set`](Self::set) returns.
///
/// Once the last subscriber of a key is removed, the key is evicted after
/// the store's cleanup timeout unless a new subscriber arrives first.
///
/// `Store` is a cheap handle; clones share the same entries.
///
/// # Examples
///
/// ```
/// use larder::{create_key, Store};
///
/// let store = Store::new();
/// let count = create_key::<i32>("count");
///
/// assert_eq!(store.get(&count), None);
/// assert_eq!(*store.get_or(&count, 7), 7);
///
/// store.set(&count, 5);
/// assert_eq!(store.get(&count).as_deref(), Some(&5));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a store with the default options.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Create a store with the given cleanup timeout and scheduler.
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                cleanup_timeout: options.cleanup_timeout,
                scheduler: options.resolve_scheduler(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    /// Delay between a key losing its last subscriber and its eviction.
    pub fn cleanup_timeout(&self) -> Duration {
        self.inner.cleanup_timeout
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Get the current value of `key`, if any.
    pub fn get<T>(&self, key: &Key<T>) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.inner.state.lock().values.get(key.id()).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Get the current value of `key`, or `default` if it has none.
    ///
    /// The default is not written to the store.
    pub fn get_or<T>(&self, key: &Key<T>, default: T) -> Arc<T>
    where
        T: Send + Sync + 'static,
    {
        self.get(key).unwrap_or_else(|| Arc::new(default))
    }

    /// Like [`get_or`](Self::get_or), but the default is only computed when
    /// the key has no value. Nothing is written to the store.
    pub fn get_or_else<T, F>(&self, key: &Key<T>, default: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.get(key).unwrap_or_else(|| Arc::new(default()))
    }

    /// Store `value` under `key` and notify its subscribers.
    ///
    /// Passing a plain `T` always counts as a change. Passing an `Arc<T>`
    /// that is pointer-identical to the stored one does nothing.
    pub fn set<T, V>(&self, key: &Key<T>, value: V)
    where
        T: Send + Sync + 'static,
        V: Into<Arc<T>>,
    {
        let value: Arc<T> = value.into();
        self.write(key.id(), value, |_| true);
    }

    /// Replace the value of `key` with one computed from the current value.
    ///
    /// `f` runs without the store lock held. If another write lands on `key`
    /// in the meantime, `f` is called again with the newer value, so no
    /// concurrent write is lost.
    pub fn update<T, F>(&self, key: &Key<T>, mut f: F)
    where
        T: Send + Sync + 'static,
        F: FnMut(Option<&T>) -> T,
    {
        loop {
            let current = self.inner.state.lock().values.get(key.id()).cloned();
            let next = {
                let previous = current.clone().and_then(|value| value.downcast::<T>().ok());
                Arc::new(f(previous.as_deref()))
            };

            let (_, written) = self.write(key.id(), next, |stored| match (stored, &current) {
                (Some(stored), Some(current)) => Arc::ptr_eq(stored, current),
                (None, None) => true,
                _ => false,
            });
            if written {
                return;
            }
        }
    }

    /// Return the value of `key`, first storing `default()` if it has none.
    ///
    /// Unlike [`get_or_else`](Self::get_or_else) the default is persisted,
    /// and subscribers are notified of it.
    pub fn ensure<T, F>(&self, key: &Key<T>, default: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = Arc::new(default());
        let (stored, _) = self.write(key.id(), value.clone(), |current| current.is_none());
        stored.downcast::<T>().unwrap_or(value)
    }

    /// Register `callback` to receive every new value of `key`.
    ///
    /// Registering cancels a pending eviction of the key.
    pub fn on<T, F>(&self, key: &Key<T>, callback: F) -> Subscription
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(
            key.id(),
            Arc::new(move |value: &Value| {
                if let Some(value) = (**value).downcast_ref::<T>() {
                    callback(value);
                }
            }),
        )
    }

    /// Like [`on`](Self::on), but the callback receives the shared value.
    pub fn on_shared<T, F>(&self, key: &Key<T>, callback: F) -> Subscription
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.subscribe(
            key.id(),
            Arc::new(move |value: &Value| {
                if let Ok(value) = Arc::clone(value).downcast::<T>() {
                    callback(value);
                }
            }),
        )
    }

    /// Whether `key` currently holds a value.
    pub fn contains<T>(&self, key: &Key<T>) -> bool {
        self.inner.state.lock().values.contains_key(key.id())
    }

    /// Number of live subscriptions on `key`.
    pub fn subscriber_count<T>(&self, key: &Key<T>) -> usize {
        self.inner
            .state
            .lock()
            .subscribers
            .get(key.id())
            .map_or(0, HashMap::len)
    }

    /// Whether `key` is waiting to be evicted.
    pub fn is_cleanup_pending<T>(&self, key: &Key<T>) -> bool {
        self.inner.state.lock().pending_cleanup.contains_key(key.id())
    }

    /// Number of keys holding a value.
    pub fn len(&self) -> usize {
        self.inner.state.lock().values.len()
    }

    /// Whether no key holds a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `value` if `accept` approves of the entry currently held, and
    /// notify. Returns the value `key` holds afterwards and whether it was
    /// written.
    fn write<T, A>(&self, key: &KeyId, value: Arc<T>, accept: A) -> (Value, bool)
    where
        T: Send + Sync + 'static,
        A: FnOnce(Option<&Value>) -> bool,
    {
        let value: Value = value;
        let (previous, subscribers) = {
            let mut state = self.inner.state.lock();
            let current = state.values.get(key);
            if let Some(current) = current {
                if Arc::ptr_eq(current, &value) {
                    return (Arc::clone(current), false);
                }
            }
            if !accept(current) {
                let current = current.map_or_else(|| Arc::clone(&value), Arc::clone);
                return (current, false);
            }
            let previous = state.values.insert(key.clone(), Arc::clone(&value));
            (previous, state.snapshot(key))
        };

        diagnostics::debug(format_args!(
            "set {key} (replaced: {})",
            previous.is_some()
        ));
        drop(previous);
        self.notify(key, &value, type_name::<T>(), subscribers);
        (value, true)
    }

    /// Deliver `value` to a snapshot of subscribers taken under the lock.
    fn notify(
        &self,
        key: &KeyId,
        value: &Value,
        value_type: &str,
        subscribers: Vec<Callback>,
    ) {
        diagnostics::debug(format_args!(
            "notify {key} (value: {value_type}, subscribers: {})",
            subscribers.len()
        ));

        for callback in subscribers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(value))) {
                let error = SubscriberPanic::from_payload(key, &*payload);
                diagnostics::error(format_args!("{error}"));
            }
        }
    }

    fn subscribe(&self, key: &KeyId, callback: Callback) -> Subscription {
        let (id, canceled) = {
            let mut state = self.inner.state.lock();
            state.next_subscriber += 1;
            let id = SubscriberId(state.next_subscriber);
            state
                .subscribers
                .entry(key.clone())
                .or_default()
                .insert(id, callback);

            let pending = state.pending_cleanup.remove(key);
            if let Some(pending) = &pending {
                self.inner.scheduler.cancel(pending.timer);
            }
            (id, pending.is_some())
        };

        diagnostics::debug(format_args!("subscribe {key}"));
        if canceled {
            diagnostics::debug(format_args!("cleanup canceled {key}"));
        }
        Subscription::new(Arc::downgrade(&self.inner), key.clone(), id)
    }

    pub(crate) fn unsubscribe(&self, key: &KeyId, id: SubscriberId) {
        diagnostics::debug(format_args!("unsubscribe {key}"));

        let (callback, scheduled) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(subscribers) = state.subscribers.get_mut(key) else {
                return;
            };
            let Some(callback) = subscribers.remove(&id) else {
                return;
            };

            if !subscribers.is_empty() {
                (callback, false)
            } else if !state.values.contains_key(key) {
                // Nothing to evict; forget the key right away.
                state.subscribers.remove(key);
                (callback, false)
            } else {
                (callback, self.arm_cleanup(state, key))
            }
        };

        drop(callback);
        if scheduled {
            diagnostics::debug(format_args!(
                "cleanup scheduled {key} (in {:?})",
                self.inner.cleanup_timeout
            ));
        }
    }

    fn arm_cleanup(&self, state: &mut StoreState, key: &KeyId) -> bool {
        if state.pending_cleanup.contains_key(key) {
            return false;
        }

        state.next_epoch += 1;
        let epoch = state.next_epoch;
        let store = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        let timer = self.inner.scheduler.schedule(
            self.inner.cleanup_timeout,
            Box::new(move || {
                if let Some(inner) = store.upgrade() {
                    Store::from_inner(inner).run_cleanup(&task_key, epoch);
                }
            }),
        );

        state
            .pending_cleanup
            .insert(key.clone(), PendingCleanup { epoch, timer });
        true
    }

    /// Evict `key`, unless the cleanup armed with `epoch` has since been
    /// canceled or replaced.
    fn run_cleanup(&self, key: &KeyId, epoch: u64) {
        let evicted = {
            let mut state = self.inner.state.lock();
            match state.pending_cleanup.get(key) {
                Some(pending) if pending.epoch == epoch => {}
                _ => return,
            }
            state.pending_cleanup.remove(key);
            (state.values.remove(key), state.subscribers.remove(key))
        };

        drop(evicted);
        diagnostics::debug(format_args!("cleanup {key}"));
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Store")
            .field("values", &state.values.len())
            .field("subscribed_keys", &state.subscribers.len())
            .field("pending_cleanup", &state.pending_cleanup.len())
            .field("cleanup_timeout", &self.inner.cleanup_timeout)
            .finish()
    }
}
