use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Runtime identity of a key: the label it was created with plus the
/// factory sequence number that makes it unique.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    label: Arc<str>,
    seq: u64,
}

impl KeyId {
    /// The human-readable label passed to [`KeyFactory::create`].
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The sequence number assigned by the factory.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.label, self.seq)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A key addressing a value of type `T` in a [`Store`](crate::Store).
///
/// The type parameter is a compile-time tag only; it adds nothing to the
/// runtime representation. Two keys compare equal iff their [`KeyId`]s do,
/// regardless of `T`. Building keys of different value types that share a
/// `KeyId` (for instance via two independent [`KeyFactory`]s used against the
/// same store) is a caller error that is not detected at runtime: reads
/// through the mismatched key simply find no value of the expected type.
pub struct Key<T> {
    id: KeyId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// The untyped runtime token of this key.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// The label the key was created with.
    pub fn label(&self) -> &str {
        self.id.label()
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.id).finish()
    }
}

/// Generator of unique keys.
///
/// Each factory owns a monotonic counter that starts at 0 and is never reset.
/// Keys from one factory never collide, even when labels repeat. Use
/// [`KeyFactory::global`] (or [`create_key`]) for process-wide keys and
/// [`KeyFactory::new`] when an isolated sequence is wanted, e.g. in tests.
#[derive(Debug, Default)]
pub struct KeyFactory {
    counter: AtomicU64,
}

impl KeyFactory {
    /// Create an independent factory with its own counter.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// The process-wide factory backing [`create_key`].
    pub fn global() -> &'static KeyFactory {
        static FACTORY: OnceLock<KeyFactory> = OnceLock::new();
        FACTORY.get_or_init(KeyFactory::new)
    }

    /// Create a new key for values of type `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use larder::KeyFactory;
    ///
    /// let factory = KeyFactory::new();
    /// let a = factory.create::<u32>("count");
    /// let b = factory.create::<u32>("count");
    /// assert_ne!(a, b);
    /// assert_eq!(a.to_string(), "count[1]");
    /// ```
    pub fn create<T>(&self, label: &str) -> Key<T> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Key {
            id: KeyId {
                label: Arc::from(label),
                seq,
            },
            _marker: PhantomData,
        }
    }

    /// Number of keys this factory has produced so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

/// Create a key from the process-wide [`KeyFactory`].
pub fn create_key<T>(label: &str) -> Key<T> {
    KeyFactory::global().create(label)
}
