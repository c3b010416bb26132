//! In-flight request coalescing.
//!
//! The first caller for a key becomes the owner and gets an [`OwnerSlot`]; later
//! callers get a [`WaitSlot`] that resolves to the owner's value. Each slot is a
//! resolve-once `watch` cell. The registry entry is removed when the owner slot
//! is dropped, whether or not it was resolved, so a failed or panicked owner
//! never leaves a key stuck.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

type Slots<K, V> = Arc<Mutex<HashMap<K, watch::Receiver<Option<V>>>>>;

fn lock<K, V>(slots: &Slots<K, V>) -> MutexGuard<'_, HashMap<K, watch::Receiver<Option<V>>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of pending results keyed by request identity.
#[derive(Debug)]
pub struct InflightRegistry<K, V> {
    slots: Slots<K, V>,
}

impl<K, V> Default for InflightRegistry<K, V> {
    fn default() -> Self {
        Self { slots: Arc::new(Mutex::new(HashMap::new())) }
    }
}

/// Outcome of [`InflightRegistry::join_or_create`].
#[derive(Debug)]
pub enum Slot<K: Eq + Hash, V> {
    /// No fetch was pending; the caller must produce the value.
    Owner(OwnerSlot<K, V>),
    /// Another caller is producing the value.
    Waiter(WaitSlot<V>),
}

impl<K, V> InflightRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the pending slot for `key`, or register a new one and own it.
    pub fn join_or_create(&self, key: K) -> Slot<K, V> {
        let mut slots = lock(&self.slots);
        if let Some(rx) = slots.get(&key) {
            return Slot::Waiter(WaitSlot { rx: rx.clone() });
        }

        let (tx, rx) = watch::channel(None);
        slots.insert(key.clone(), rx);
        Slot::Owner(OwnerSlot { slots: Arc::clone(&self.slots), key, tx })
    }

    /// Number of keys currently in flight.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ownership of an in-flight key. Dropping it removes the key.
#[derive(Debug)]
pub struct OwnerSlot<K: Eq + Hash, V> {
    slots: Slots<K, V>,
    key: K,
    tx: watch::Sender<Option<V>>,
}

impl<K: Eq + Hash, V> OwnerSlot<K, V> {
    /// Publish the value to every waiter and release the key.
    pub fn resolve(self, value: V) {
        self.tx.send_replace(Some(value));
    }
}

impl<K: Eq + Hash, V> Drop for OwnerSlot<K, V> {
    fn drop(&mut self) {
        lock(&self.slots).remove(&self.key);
    }
}

/// A pending result produced by another caller.
#[derive(Debug)]
pub struct WaitSlot<V> {
    rx: watch::Receiver<Option<V>>,
}

impl<V: Clone> WaitSlot<V> {
    /// Wait for the owner's value.
    ///
    /// Returns None if the owner went away without resolving.
    pub async fn wait(mut self) -> Option<V> {
        self.rx.wait_for(Option::is_some).await.ok().and_then(|value| value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_caller_owns() {
        let registry: InflightRegistry<String, u32> = InflightRegistry::new();
        let slot = registry.join_or_create("a".into());
        assert!(matches!(slot, Slot::Owner(_)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_waiters_receive_owner_value() {
        let registry: InflightRegistry<String, String> = InflightRegistry::new();
        let Slot::Owner(owner) = registry.join_or_create("k".into()) else {
            panic!("expected owner");
        };
        let Slot::Waiter(w1) = registry.join_or_create("k".into()) else {
            panic!("expected waiter");
        };
        let Slot::Waiter(w2) = registry.join_or_create("k".into()) else {
            panic!("expected waiter");
        };

        let h1 = tokio::spawn(w1.wait());
        let h2 = tokio::spawn(w2.wait());
        owner.resolve("done".to_string());

        assert_eq!(h1.await.unwrap().as_deref(), Some("done"));
        assert_eq!(h2.await.unwrap().as_deref(), Some("done"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share() {
        let registry: InflightRegistry<String, u32> = InflightRegistry::new();
        let _a = registry.join_or_create("a".into());
        let b = registry.join_or_create("b".into());
        assert!(matches!(b, Slot::Owner(_)));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_owner_releases_key() {
        let registry: InflightRegistry<String, u32> = InflightRegistry::new();
        let Slot::Owner(owner) = registry.join_or_create("k".into()) else {
            panic!("expected owner");
        };
        let Slot::Waiter(waiter) = registry.join_or_create("k".into()) else {
            panic!("expected waiter");
        };

        drop(owner);

        assert!(registry.is_empty());
        assert_eq!(waiter.wait().await, None);
        assert!(matches!(registry.join_or_create("k".into()), Slot::Owner(_)));
    }

    #[tokio::test]
    async fn test_key_reusable_after_resolve() {
        let registry: InflightRegistry<String, u32> = InflightRegistry::new();
        let Slot::Owner(owner) = registry.join_or_create("k".into()) else {
            panic!("expected owner");
        };
        owner.resolve(1);
        assert!(matches!(registry.join_or_create("k".into()), Slot::Owner(_)));
    }
}
