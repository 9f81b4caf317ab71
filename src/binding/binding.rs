use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::key::Key;
use crate::store::{Store, Subscription};

type ChangeFn<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;
type DefaultFn<T> = Box<dyn Fn() -> T + Send + Sync>;

/// An active interest in one `(store, key)` pair.
///
/// On activation the binding writes the default into the store if the key
/// has no value yet, then subscribes. Every later value reaches `on_change`
/// and is readable through [`value`](Self::value). Dropping the binding
/// unsubscribes, which starts the key's grace period if nothing else
/// listens to it.
///
/// # Examples
///
/// ```
/// use larder::{create_key, Binding, Store};
///
/// let store = Store::new();
/// let theme = create_key::<String>("theme");
///
/// let binding = Binding::activate(&store, &theme, || "light".to_string(), |_| {});
/// assert_eq!(binding.value().as_str(), "light");
/// assert_eq!(store.get(&theme).as_deref().map(String::as_str), Some("light"));
///
/// store.set(&theme, "dark".to_string());
/// assert_eq!(binding.value().as_str(), "dark");
/// ```
pub struct Binding<T> {
    store: Store,
    key: Key<T>,
    default: DefaultFn<T>,
    on_change: ChangeFn<T>,
    latest: Arc<Mutex<Arc<T>>>,
    subscription: Option<Subscription>,
}

impl<T> Binding<T>
where
    T: Send + Sync + 'static,
{
    /// Resolve the current value of `key` (persisting `default()` when the
    /// key is empty) and subscribe to it.
    ///
    /// `on_change` is not called for the value resolved here, only for the
    /// values that follow.
    pub fn activate<D, F>(store: &Store, key: &Key<T>, default: D, on_change: F) -> Self
    where
        D: Fn() -> T + Send + Sync + 'static,
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let initial = store.ensure(key, &default);
        let mut binding = Self {
            store: store.clone(),
            key: key.clone(),
            default: Box::new(default),
            on_change: Arc::new(on_change),
            latest: Arc::new(Mutex::new(initial)),
            subscription: None,
        };
        binding.attach();
        binding
    }

    /// Point the binding at another `(store, key)` pair.
    ///
    /// The old subscription is released first; then the new pair is
    /// subscribed and resolved like on activation. Rebinding to the pair
    /// already bound does nothing.
    pub fn rebind(&mut self, store: &Store, key: &Key<T>) {
        if self.store.ptr_eq(store) && self.key == *key {
            return;
        }

        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.store = store.clone();
        self.key = key.clone();
        self.attach();
    }

    /// The most recent value seen for the bound key.
    pub fn value(&self) -> Arc<T> {
        Arc::clone(&self.latest.lock())
    }

    /// Write a new value through to the store.
    pub fn set<V>(&self, value: V)
    where
        V: Into<Arc<T>>,
    {
        self.store.set(&self.key, value);
    }

    /// Write a value computed from the store's current one. See
    /// [`Store::update`] for when `f` runs more than once.
    pub fn update<F>(&self, f: F)
    where
        F: FnMut(Option<&T>) -> T,
    {
        self.store.update(&self.key, f);
    }

    pub fn key(&self) -> &Key<T> {
        &self.key
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Stop observing. Equivalent to dropping the binding.
    pub fn deactivate(self) {}

    fn attach(&mut self) {
        let latest = Arc::clone(&self.latest);
        let on_change = Arc::clone(&self.on_change);
        self.subscription = Some(self.store.on_shared(&self.key, move |value| {
            *latest.lock() = Arc::clone(&value);
            on_change(&value);
        }));

        let current = self.store.ensure(&self.key, &self.default);
        self.publish(current);
    }

    fn publish(&self, value: Arc<T>) {
        let changed = {
            let mut latest = self.latest.lock();
            if Arc::ptr_eq(&*latest, &value) {
                false
            } else {
                *latest = Arc::clone(&value);
                true
            }
        };
        if changed {
            (self.on_change)(&value);
        }
    }
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("active", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}
