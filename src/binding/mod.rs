//! Observer bindings for consumers that come and go.
//!
//! A [`Binding`] is what a view, widget or task holds while it is interested
//! in one key: it resolves the key's value with persisting default semantics
//! ([`Store::ensure`](crate::Store::ensure)), stays subscribed while active
//! and unsubscribes exactly once when it is dropped or pointed elsewhere.

mod binding;

pub use binding::Binding;
