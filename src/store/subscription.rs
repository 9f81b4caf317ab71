use std::fmt;
use std::sync::Weak;

use super::store::{Store, StoreInner};
use crate::key::KeyId;

/// Identifies one registered subscriber within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

/// RAII guard for a subscriber registered with [`Store::on`].
///
/// Unsubscribes exactly once: either through [`unsubscribe`](Self::unsubscribe)
/// or when the guard is dropped. Use [`detach`](Self::detach) to keep the
/// subscriber for the lifetime of the store.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    key: KeyId,
    id: SubscriberId,
    active: bool,
}

impl Subscription {
    pub(crate) fn new(store: Weak<StoreInner>, key: KeyId, id: SubscriberId) -> Self {
        Self {
            store,
            key,
            id,
            active: true,
        }
    }

    /// The key this subscription listens to.
    pub fn key(&self) -> &KeyId {
        &self.key
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber. If it was the key's last one, the key's
    /// cleanup timer is armed.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Leave the subscriber registered for as long as the store lives.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        if let Some(inner) = self.store.upgrade() {
            Store::from_inner(inner).unsubscribe(&self.key, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
