//! The keyed, observable value store.
//!
//! A [`Store`] maps [`Key`](crate::Key)s to shared values, fans every change
//! out to the key's subscribers and evicts entries a grace period after
//! their last subscriber goes away.

mod options;
mod store;
mod subscription;

pub use options::{create_store, StoreOptions, DEFAULT_CLEANUP_TIMEOUT};
pub use store::Store;
pub use subscription::{SubscriberId, Subscription};
