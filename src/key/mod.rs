//! Typed keys addressing store entries.
//!
//! A [`Key<T>`] is an opaque, process-unique token. The value type `T` exists
//! only at compile time; at runtime every key is just a [`KeyId`].

mod key;

pub use key::{create_key, Key, KeyFactory, KeyId};
