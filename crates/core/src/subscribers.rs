//! Observer lists for change notifications
//!
//! Components that publish state changes (the metric store, the accessory
//! selection, sensor sources) keep a `Subscribers<E>` and call `notify` after
//! every change. Callbacks run synchronously on the notifying thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A list of callbacks interested in events of type `E`
pub struct Subscribers<E> {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(u64, Callback<E>)>>,
}

impl<E> Subscribers<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Register a callback
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    /// Register an already shared callback
    pub fn subscribe_arc(&self, callback: Arc<dyn Fn(&E) + Send + Sync>) -> SubscriptionToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));
        SubscriptionToken(id)
    }

    /// Remove a callback; returns false if the token was unknown
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut callbacks = self.callbacks.write().unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(id, _)| *id != token.0);
        callbacks.len() != before
    }

    /// Invoke every callback with `event`
    pub fn notify(&self, event: &E) {
        // Clone the handles and release the lock before calling out, so a
        // callback may subscribe or unsubscribe without deadlocking.
        let snapshot: Vec<Callback<E>> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_reaches_every_subscriber() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        let total = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let total = Arc::clone(&total);
            subscribers.subscribe(move |value: &u32| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }

        subscribers.notify(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let subscribers: Subscribers<()> = Subscribers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let token = subscribers.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        subscribers.notify(&());
        assert!(subscribers.unsubscribe(token));
        assert!(!subscribers.unsubscribe(token));
        subscribers.notify(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let subscribers: Arc<Subscribers<()>> = Arc::new(Subscribers::new());
        let token_slot: Arc<RwLock<Option<SubscriptionToken>>> = Arc::new(RwLock::new(None));

        let list = Arc::clone(&subscribers);
        let slot = Arc::clone(&token_slot);
        let token = subscribers.subscribe(move |_| {
            if let Some(token) = *slot.read().unwrap() {
                list.unsubscribe(token);
            }
        });
        *token_slot.write().unwrap() = Some(token);

        subscribers.notify(&());
        assert!(subscribers.is_empty());
    }
}
