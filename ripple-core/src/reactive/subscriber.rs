//! Subscriber identities and dependency sets.
//!
//! A subscriber is any computation that depends on reactive values: effects,
//! memo getters, watchers and component render functions. A [`Dep`] is the set
//! of subscribers currently depending on one reactive field.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::effect::{Effect, WeakEffect};

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. The ID is used to key
/// dependency sets and to avoid duplicate subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The set of subscribers depending on one reactive field.
///
/// Insertion order is preserved so that triggered subscribers re-run in the
/// order they first subscribed. Entries are weak: a dependency never keeps an
/// effect alive on its own.
#[derive(Clone, Default)]
pub struct Dep {
    subscribers: Arc<Mutex<IndexMap<SubscriberId, WeakEffect>>>,
}

impl Dep {
    /// Create an empty dependency set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns `false` if it was already present.
    pub(crate) fn insert(&self, effect: &Effect) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&effect.id()) {
            return false;
        }
        subscribers.insert(effect.id(), effect.downgrade());
        true
    }

    /// Remove a subscriber.
    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.lock().shift_remove(&id);
    }

    /// Check whether a subscriber is in this set.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// IDs of the current subscribers, in subscription order.
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.subscribers.lock().keys().copied().collect()
    }

    /// Live subscribers, in subscription order.
    ///
    /// The lock is released before returning so callers can re-run the
    /// subscribers, which mutates this set.
    pub(crate) fn snapshot(&self) -> Vec<Effect> {
        self.subscribers
            .lock()
            .values()
            .filter_map(WeakEffect::upgrade)
            .collect()
    }

    /// Two handles referring to the same set.
    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Arc::ptr_eq(&self.subscribers, &other.subscribers)
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.subscriber_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn dep_deduplicates_and_keeps_order() {
        let dep = Dep::new();
        let first = Effect::new_lazy(|| {});
        let second = Effect::new_lazy(|| {});

        assert!(dep.insert(&first));
        assert!(dep.insert(&second));
        assert!(!dep.insert(&first));

        assert_eq!(dep.subscriber_ids(), vec![first.id(), second.id()]);

        dep.remove(first.id());
        assert_eq!(dep.subscriber_ids(), vec![second.id()]);
    }

    #[test]
    fn dep_does_not_keep_effects_alive() {
        let dep = Dep::new();
        {
            let effect = Effect::computed(Box::new(|| {}), Arc::new(|| {}));
            dep.insert(&effect);
            assert_eq!(dep.snapshot().len(), 1);
        }
        assert!(dep.snapshot().is_empty());
    }
}
