// =============================================================================
// Fan-out Broker — non-blocking pub/sub with per-subscriber bounded buffers
// =============================================================================
//
// Deliberately NOT tokio::sync::broadcast: that primitive drops for every
// subscriber once any one of them lags. Here a slow subscriber only ever
// loses messages for itself; publish() never blocks and never contends with
// a subscriber's receive. Registration lives behind a RwLock: publish takes
// the read side, subscribe/unsubscribe take the write side, and neither ever
// awaits while holding it.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

const MIN_BUFFER: usize = 16;

/// A live subscription. Dropping it unsubscribes automatically.
pub struct Subscription<T> {
    id: u64,
    broker: Arc<BrokerInner<T>>,
    receiver: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.id);
    }
}

struct BrokerInner<T> {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<u64, mpsc::Sender<T>>>,
}

impl<T> BrokerInner<T> {
    fn unsubscribe(&self, id: u64) {
        self.subscribers.write().remove(&id);
    }
}

/// Generic fan-out broker, cloneable and cheap to share across tasks.
pub struct Broker<T> {
    inner: Arc<BrokerInner<T>>,
}

impl<T> Clone for Broker<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: Clone + Send + 'static> Broker<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                next_id: AtomicU64::new(1),
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Registers a new subscriber with a bounded buffer (coerced to at least
    /// `MIN_BUFFER` when the caller asks for less).
    pub fn subscribe(&self, buffer: usize) -> Subscription<T> {
        let buffer = buffer.max(MIN_BUFFER);
        let (tx, rx) = mpsc::channel(buffer);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().insert(id, tx);
        Subscription { id, broker: self.inner.clone(), receiver: rx }
    }

    /// Offers `msg` to every subscriber without blocking. A subscriber whose
    /// buffer is full or whose receiver has been dropped simply misses it.
    pub fn publish(&self, msg: T) {
        let subscribers = self.inner.subscribers.read();
        for tx in subscribers.values() {
            let _ = tx.try_send(msg.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

impl<T: Clone + Send + 'static> Default for Broker<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_messages_in_order() {
        let broker: Broker<i32> = Broker::new();
        let mut sub = broker.subscribe(16);
        broker.publish(1);
        broker.publish(2);
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
    }

    #[tokio::test]
    async fn full_buffer_drops_for_that_subscriber_only_then_resumes() {
        let broker: Broker<i32> = Broker::new();
        let mut sub = broker.subscribe(16);
        for i in 0..20 {
            broker.publish(i);
        }
        // The later publishes were dropped once the 16-slot buffer filled
        // (none of them were ever drained); the subscriber still drains
        // everything it did accept in order.
        let mut received = Vec::new();
        while let Ok(v) = sub.receiver.try_recv() {
            received.push(v);
        }
        assert!(received.len() <= 16);
        assert!(received.windows(2).all(|w| w[0] < w[1]));

        broker.publish(999);
        assert_eq!(sub.recv().await, Some(999));
    }

    #[tokio::test]
    async fn unsubscribe_on_drop_shrinks_subscriber_count() {
        let broker: Broker<i32> = Broker::new();
        {
            let _sub = broker.subscribe(16);
            assert_eq!(broker.subscriber_count(), 1);
        }
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_never_blocks_even_with_slow_subscriber() {
        let broker: Broker<i32> = Broker::new();
        let _sub = broker.subscribe(16);
        for i in 0..1000 {
            broker.publish(i);
        }
    }
}
