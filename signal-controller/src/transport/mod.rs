//! Publish/subscribe transport boundary.
//!
//! The controller never talks to a broker directly. Inbound telemetry is
//! pulled from a bounded [`Subscription`] queue and outbound schedules go
//! through the [`Transport`] trait, so the message-arrival stream and the
//! cycle timer stay two independent inputs.
//!
//! # Implementations
//!
//! - [`MemoryBroker`] - in-process broker with wildcard subscriptions
//! - [`UdpTransport`] - datagram gateway (`<topic>\n<payload>` framing)

mod memory;
pub mod topic;
mod udp;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

pub use memory::MemoryBroker;
pub use topic::{command_topic, parse_telemetry_topic, telemetry_topic, topic_matches};
pub use udp::{UdpTransport, UdpTransportConfig};

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,

    /// Sending failed at the I/O layer.
    #[error("send to {target} failed: {source}")]
    Send {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to bind a local socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No destination is configured for outbound messages.
    #[error("no destination configured for topic {0}")]
    NoDestination(String),

    /// Injected or broker-reported rejection.
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// A message received from, or destined for, a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Outbound side of a pub/sub transport.
pub trait Transport: Send + Sync {
    /// Publish one payload to `topic`.
    ///
    /// Implementations may block on I/O; callers bound every call with a
    /// timeout.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Result of a bounded receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    Message(Message),
    TimedOut,
    Closed,
}

/// Inbound side of a subscription: a bounded queue of messages.
pub struct Subscription {
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    /// Create a subscription with its producer handle.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Message>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }

    /// Wait for the next message; `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Wait for the next message for at most `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Received {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(message)) => Received::Message(message),
            Ok(None) => Received::Closed,
            Err(_) => Received::TimedOut,
        }
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_recv_timeout_states() {
        let (tx, mut sub) = Subscription::channel(4);

        assert_eq!(
            sub.recv_timeout(Duration::from_millis(50)).await,
            Received::TimedOut
        );

        tx.send(Message::new("a/b", b"x".to_vec())).await.unwrap();
        assert_eq!(
            sub.recv_timeout(Duration::from_millis(50)).await,
            Received::Message(Message::new("a/b", b"x".to_vec()))
        );

        drop(tx);
        assert_eq!(
            sub.recv_timeout(Duration::from_millis(50)).await,
            Received::Closed
        );
    }
}
