use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use crate::error::{BroadcasterError, Result};

pub type SubscriberId = u64;

/// Pre-serialized message shared by every subscriber queue
pub type Payload = Arc<str>;

/// Outcome of handing a payload to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full, this payload is skipped for the subscriber
    Dropped,
    /// Writer gone, the subscriber is dead
    Closed,
}

/// Registered display client.
///
/// The registry owns this handle; the socket itself lives in the
/// subscriber's writer task, fed through a bounded queue.
pub struct Subscriber {
    id: SubscriberId,
    peer: SocketAddr,
    outbound: mpsc::Sender<Payload>,
    alive: Arc<AtomicBool>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    /// Queue a payload without waiting
    pub fn try_deliver(&self, payload: &Payload) -> Delivery {
        if !self.alive.load(Ordering::Acquire) {
            return Delivery::Closed;
        }
        match self.outbound.try_send(Arc::clone(payload)) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Liveness flag shared between a subscriber's registry entry and its writer
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    /// Mark the subscriber closed; the next broadcast removes it
    pub fn mark_closed(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Result of one broadcast pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub queued: usize,
    pub dropped: usize,
    pub removed: Vec<SubscriberId>,
}

/// Thread-safe subscriber set
#[derive(Clone)]
pub struct SubscriberRegistry {
    subscribers: Arc<Mutex<HashMap<SubscriberId, Subscriber>>>,
    next_id: Arc<AtomicU64>,
    max_subscribers: usize,
}

impl SubscriberRegistry {
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            max_subscribers,
        }
    }

    /// Register a subscriber fed by `outbound`
    pub async fn add(
        &self,
        peer: SocketAddr,
        outbound: mpsc::Sender<Payload>,
    ) -> Result<(SubscriberId, Liveness)> {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.len() >= self.max_subscribers {
            return Err(BroadcasterError::SubscriberLimit(self.max_subscribers));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let alive = Arc::new(AtomicBool::new(true));
        subscribers.insert(
            id,
            Subscriber {
                id,
                peer,
                outbound,
                alive: Arc::clone(&alive),
            },
        );
        tracing::info!("Subscriber {} ({}) registered. Total subscribers: {}", id, peer, subscribers.len());

        Ok((id, Liveness(alive)))
    }

    /// Unregister a subscriber; removing an unknown id is a no-op
    pub async fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        match subscribers.remove(&id) {
            Some(subscriber) => {
                subscriber.alive.store(false, Ordering::Release);
                tracing::info!("Removed subscriber {}. Remaining: {}", id, subscribers.len());
                true
            }
            None => false,
        }
    }

    /// Hand the payload to every subscriber, removing dead ones
    pub async fn broadcast(&self, payload: &Payload) -> BroadcastReport {
        let mut subscribers = self.subscribers.lock().await;
        let mut report = BroadcastReport::default();

        for (id, subscriber) in subscribers.iter() {
            match subscriber.try_deliver(payload) {
                Delivery::Queued => report.queued += 1,
                Delivery::Dropped => {
                    tracing::warn!("Subscriber {} is falling behind, message dropped", id);
                    report.dropped += 1;
                }
                Delivery::Closed => report.removed.push(*id),
            }
        }

        for id in &report.removed {
            subscribers.remove(id);
            tracing::info!("Removed dead subscriber {}. Remaining: {}", id, subscribers.len());
        }

        report
    }

    /// Drop every subscriber, closing their queues
    pub async fn clear(&self) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        let count = subscribers.len();
        for subscriber in subscribers.values() {
            subscriber.alive.store(false, Ordering::Release);
        }
        subscribers.clear();
        count
    }

    /// Get current subscriber count
    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.lock().await.is_empty()
    }

    /// Ids of the current subscribers, sorted
    pub async fn ids(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<_> = self.subscribers.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn max_subscribers(&self) -> usize {
        self.max_subscribers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn payload(text: &str) -> Payload {
        Arc::from(text)
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let registry = SubscriberRegistry::new(8);
        let (tx, _rx) = mpsc::channel(4);

        let (id, liveness) = registry.add(peer(1000), tx).await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert!(liveness.is_alive());

        assert!(registry.remove(id).await);
        assert!(registry.is_empty().await);
        assert!(!liveness.is_alive());

        // Second removal is a no-op
        assert!(!registry.remove(id).await);
    }

    #[tokio::test]
    async fn test_failed_send_removes_only_that_subscriber() {
        let registry = SubscriberRegistry::new(16);
        let mut receivers = Vec::new();
        let mut ids = Vec::new();

        for i in 0..5 {
            let (tx, rx) = mpsc::channel(4);
            let (id, _) = registry.add(peer(2000 + i), tx).await.unwrap();
            ids.push(id);
            receivers.push(Some(rx));
        }

        // Subscriber 2's writer has gone away
        receivers[2] = None;

        let report = registry.broadcast(&payload("tick")).await;
        assert_eq!(report.removed, vec![ids[2]]);
        assert_eq!(report.queued, 4);

        let remaining = registry.ids().await;
        let expected: Vec<_> = ids.iter().copied().filter(|id| *id != ids[2]).collect();
        assert_eq!(remaining, expected);

        for rx in receivers.iter_mut().flatten() {
            assert_eq!(&*rx.recv().await.unwrap(), "tick");
        }
    }

    #[tokio::test]
    async fn test_marked_closed_is_removed_on_next_broadcast() {
        let registry = SubscriberRegistry::new(4);
        let (tx, _rx) = mpsc::channel(4);
        let (id, liveness) = registry.add(peer(3000), tx).await.unwrap();

        liveness.mark_closed();
        let report = registry.broadcast(&payload("x")).await;
        assert_eq!(report.removed, vec![id]);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_full_queue_drops_message_but_keeps_subscriber() {
        let registry = SubscriberRegistry::new(4);
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(4);
        registry.add(peer(4000), slow_tx).await.unwrap();
        registry.add(peer(4001), fast_tx).await.unwrap();

        let first = registry.broadcast(&payload("one")).await;
        assert_eq!(first.queued, 2);

        let second = registry.broadcast(&payload("two")).await;
        assert_eq!(second.queued, 1);
        assert_eq!(second.dropped, 1);
        assert!(second.removed.is_empty());
        assert_eq!(registry.len().await, 2);

        assert_eq!(&*slow_rx.recv().await.unwrap(), "one");
        assert_eq!(&*fast_rx.recv().await.unwrap(), "one");
        assert_eq!(&*fast_rx.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_limit_enforced() {
        let registry = SubscriberRegistry::new(2);
        let (tx, _rx) = mpsc::channel(1);

        assert_ok!(registry.add(peer(5000), tx.clone()).await);
        assert_ok!(registry.add(peer(5001), tx.clone()).await);
        let err = assert_err!(registry.add(peer(5002), tx).await);
        assert!(matches!(err, BroadcasterError::SubscriberLimit(2)));
    }

    #[tokio::test]
    async fn test_concurrent_add_remove() {
        let registry = SubscriberRegistry::new(1000);
        let mut handles = Vec::new();

        for i in 0..50u16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (tx, rx) = mpsc::channel(1);
                let (id, _) = registry.add(peer(6000 + i), tx).await.unwrap();
                registry.broadcast(&payload("p")).await;
                if i % 2 == 0 {
                    registry.remove(id).await;
                }
                drop(rx);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Every odd subscriber dropped its receiver; one more pass clears them
        registry.broadcast(&payload("p")).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear() {
        let registry = SubscriberRegistry::new(4);
        let (tx, mut rx) = mpsc::channel(1);
        registry.add(peer(7000), tx).await.unwrap();

        assert_eq!(registry.clear().await, 1);
        assert!(rx.recv().await.is_none());
    }
}
