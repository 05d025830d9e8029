//! In-process broker.
//!
//! Fans every published message out to the subscriptions whose filter
//! matches. Delivery never blocks the publisher: a full subscriber queue
//! drops the message and bumps [`MemoryBroker::dropped`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use super::topic::topic_matches;
use super::{Message, Subscription, Transport, TransportError};

struct Subscriber {
    filter: String,
    tx: mpsc::Sender<Message>,
}

#[derive(Default)]
struct BrokerInner {
    subscribers: Mutex<Vec<Subscriber>>,
    dropped: AtomicU64,
}

/// Cloneable handle to an in-process broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `filter` with a queue of `capacity` messages.
    pub fn subscribe(&self, filter: &str, capacity: usize) -> Subscription {
        let (tx, subscription) = Subscription::channel(capacity);
        self.inner.subscribers.lock().push(Subscriber {
            filter: filter.to_string(),
            tx,
        });
        subscription
    }

    /// Deliver to matching subscribers, returning how many accepted it.
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
        let mut delivered = 0;
        let mut subscribers = self.inner.subscribers.lock();

        subscribers.retain(|sub| {
            if !topic_matches(&sub.filter, topic) {
                return true;
            }
            match sub.tx.try_send(Message::new(topic, payload.to_vec())) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(topic, filter = %sub.filter, dropped, "Subscriber queue full, dropping message");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });

        delivered
    }

    /// Messages dropped because a subscriber queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Transport for MemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.deliver(topic, &payload);
        Ok(())
    }
}
