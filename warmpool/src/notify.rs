//! Pool-updated notifications.
//!
//! Every time a pool gains an item the registry emits a [`PoolUpdated`]
//! event. Two delivery paths exist:
//!
//! - **Observers** ([`PoolObserver`]) are called synchronously on the thread
//!   that completed the fetch. Each observer sees every event exactly once,
//!   in emission order. Observers are invoked outside the pool lock, so they
//!   may call back into the registry (for example to consume the new item).
//! - **Channel** subscribers receive events through a
//!   [`tokio::sync::broadcast`] channel. A receiver that falls more than the
//!   buffer size behind skips the oldest events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use crate::pool::PoolKey;

/// Default buffer of the broadcast channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// A pool gained an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolUpdated {
    pub key: PoolKey,
}

/// Synchronous receiver of pool-updated events.
pub trait PoolObserver: Send + Sync {
    fn on_pool_updated(&self, key: &PoolKey);
}

impl<F> PoolObserver for F
where
    F: Fn(&PoolKey) + Send + Sync,
{
    fn on_pool_updated(&self, key: &PoolKey) {
        self(key)
    }
}

/// Handle returned by [`PoolNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out of [`PoolUpdated`] events.
pub struct PoolNotifier {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn PoolObserver>)>>,
    next_id: AtomicU64,
    channel: broadcast::Sender<PoolUpdated>,
}

impl PoolNotifier {
    /// Create a notifier whose broadcast channel buffers `buffer` events.
    pub fn new(buffer: usize) -> Self {
        let (channel, _) = broadcast::channel(buffer.max(1));
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            channel,
        }
    }

    /// Register a synchronous observer.
    pub fn subscribe(&self, observer: Arc<dyn PoolObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Subscribe through the broadcast channel.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<PoolUpdated> {
        self.channel.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Deliver an event for `key` to every observer and channel subscriber.
    pub fn notify(&self, key: &PoolKey) {
        let observers: Vec<Arc<dyn PoolObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        trace!(key = %key, observers = observers.len(), "Pool updated");
        for observer in observers {
            observer.on_pool_updated(key);
        }

        // No channel subscribers is fine.
        let _ = self.channel.send(PoolUpdated { key: key.clone() });
    }
}

impl Default for PoolNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<dyn PoolObserver>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: Arc<dyn PoolObserver> =
            Arc::new(move |key: &PoolKey| sink.lock().push(key.to_string()));
        (observer, seen)
    }

    #[test]
    fn test_observers_receive_events_in_order() {
        let notifier = PoolNotifier::default();
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();
        notifier.subscribe(first);
        notifier.subscribe(second);

        for key in ["a", "b", "a"] {
            notifier.notify(&PoolKey::new(key));
        }

        assert_eq!(*first_seen.lock(), vec!["a", "b", "a"]);
        assert_eq!(*second_seen.lock(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let notifier = PoolNotifier::default();
        let (observer, seen) = recorder();
        let id = notifier.subscribe(observer);

        notifier.notify(&PoolKey::new("a"));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.notify(&PoolKey::new("b"));

        assert_eq!(*seen.lock(), vec!["a"]);
        assert_eq!(notifier.observer_count(), 0);
    }

    #[test]
    fn test_observer_may_unsubscribe_itself() {
        let notifier = Arc::new(PoolNotifier::default());
        let id_slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let observer = {
            let notifier = Arc::clone(&notifier);
            let id_slot = Arc::clone(&id_slot);
            let calls = Arc::clone(&calls);
            Arc::new(move |_: &PoolKey| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *id_slot.lock() {
                    notifier.unsubscribe(id);
                }
            })
        };
        *id_slot.lock() = Some(notifier.subscribe(observer));

        notifier.notify(&PoolKey::new("a"));
        notifier.notify(&PoolKey::new("a"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_subscribers_receive_events() {
        let notifier = PoolNotifier::new(8);
        let mut rx = notifier.subscribe_channel();

        notifier.notify(&PoolKey::new("feed"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.key.as_str(), "feed");
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = PoolNotifier::new(0);
        notifier.notify(&PoolKey::new("feed"));
    }
}
