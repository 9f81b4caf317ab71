//! # Larder
//!
//! A keyed, observable, in-process value store with grace-period eviction.
//!
//! ## Keys
//!
//! - [`Key<T>`] - Opaque, process-unique token typed by the value it addresses
//! - [`KeyFactory`] / [`create_key`] - Key generation from a readable label
//!
//! ## Store
//!
//! - [`Store`] - Thread-safe map from keys to shared values
//! - Synchronous change notification to per-key subscribers
//! - Entries are evicted a configurable delay after their last subscriber
//!   leaves; a new subscriber during that window keeps the entry alive
//!
//! ## Bindings
//!
//! - [`Binding<T>`] - Subscribe-while-active helper with persisting defaults,
//!   for views and tasks that come and go
//!
//! ## Scheduling and diagnostics
//!
//! - [`Scheduler`] - Timer seam; [`ThreadScheduler`] for real time,
//!   [`ManualScheduler`] for virtual time in tests
//! - [`diagnostics`] - Replaceable process-wide log sinks
//!
//! ```
//! use larder::{create_key, create_store, ManualScheduler, StoreOptions};
//! use std::time::Duration;
//!
//! let clock = ManualScheduler::new();
//! let store = create_store(
//!     StoreOptions::default()
//!         .with_cleanup_timeout(Duration::from_millis(100))
//!         .with_scheduler(clock.clone()),
//! );
//! let name = create_key::<&str>("name");
//!
//! store.set(&name, "v");
//! let subscription = store.on(&name, |value| println!("name is now {value}"));
//! subscription.unsubscribe();
//!
//! clock.advance(Duration::from_millis(99));
//! assert_eq!(*store.get_or(&name, "gone"), "v");
//! clock.advance(Duration::from_millis(1));
//! assert_eq!(*store.get_or(&name, "gone"), "gone");
//! ```

pub mod binding;
pub mod diagnostics;
pub mod error;
pub mod key;
pub mod scheduler;
pub mod store;

// Re-export main types for convenience
pub use binding::Binding;
pub use error::SubscriberPanic;
pub use key::{create_key, Key, KeyFactory, KeyId};
pub use scheduler::{ManualScheduler, Scheduler, ThreadScheduler, TimerHandle};
pub use store::{
    create_store, Store, StoreOptions, SubscriberId, Subscription, DEFAULT_CLEANUP_TIMEOUT,
};
