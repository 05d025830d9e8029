//! UDP datagram gateway.
//!
//! Sensors (or a broker bridge) send one datagram per message, framed as the
//! topic, a newline, then the raw payload. The receive task decodes datagrams
//! into a bounded [`Subscription`]; outbound commands are sent as datagrams to
//! every configured actuator peer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{Message, Subscription, Transport, TransportError};
use crate::config::defaults;

/// Largest datagram accepted.
const MAX_DATAGRAM_SIZE: usize = 8 * 1024;

/// UDP transport configuration.
#[derive(Debug, Clone)]
pub struct UdpTransportConfig {
    /// Local address to receive telemetry on.
    pub listen_addr: SocketAddr,

    /// Actuator peers that receive every outbound command.
    pub command_peers: Vec<SocketAddr>,

    /// Capacity of the inbound telemetry queue.
    pub queue_capacity: usize,

    /// Timeout for a single socket receive, so cancellation is observed.
    pub recv_timeout: Duration,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: defaults::default_listen_addr(),
            command_peers: defaults::default_command_peers(),
            queue_capacity: defaults::DEFAULT_QUEUE_CAPACITY,
            recv_timeout: Duration::from_millis(defaults::DEFAULT_TRANSPORT_RECV_TIMEOUT_MS),
        }
    }
}

/// Datagram-based transport.
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peers: Arc<Vec<SocketAddr>>,
}

impl UdpTransport {
    /// Bind the socket and start the receive task.
    ///
    /// Returns the transport, the inbound subscription and the receive task
    /// handle. The task stops when `shutdown` is cancelled or the
    /// subscription is dropped.
    pub async fn bind(
        config: UdpTransportConfig,
        shutdown: CancellationToken,
    ) -> Result<(Self, Subscription, tokio::task::JoinHandle<()>), TransportError> {
        let socket = UdpSocket::bind(config.listen_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: config.listen_addr.to_string(),
                source,
            })?;
        let socket = Arc::new(socket);

        info!(
            listen_addr = ?socket.local_addr().ok(),
            peers = config.command_peers.len(),
            "UDP transport bound"
        );

        let (tx, subscription) = Subscription::channel(config.queue_capacity);
        let handle = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            tx,
            config.recv_timeout,
            shutdown,
        ));

        let transport = Self {
            socket,
            peers: Arc::new(config.command_peers),
        };
        Ok((transport, subscription, handle))
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

impl Transport for UdpTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.peers.is_empty() {
            return Err(TransportError::NoDestination(topic.to_string()));
        }

        let datagram = encode_datagram(topic, &payload);
        for peer in self.peers.iter() {
            self.socket
                .send_to(&datagram, peer)
                .await
                .map_err(|source| TransportError::Send {
                    target: peer.to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    tx: mpsc::Sender<Message>,
    recv_timeout: Duration,
    shutdown: CancellationToken,
) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut datagrams: u64 = 0;
    let mut undecodable: u64 = 0;
    let mut dropped: u64 = 0;

    loop {
        if shutdown.is_cancelled() || tx.is_closed() {
            break;
        }

        let recv = tokio::select! {
            _ = shutdown.cancelled() => break,
            r = tokio::time::timeout(recv_timeout, socket.recv_from(&mut buffer)) => r,
        };

        match recv {
            Ok(Ok((len, from))) => {
                datagrams += 1;
                let Some(message) = decode_datagram(&buffer[..len]) else {
                    undecodable += 1;
                    debug!(%from, len, undecodable, "Discarding datagram without topic header");
                    continue;
                };
                match tx.try_send(message) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        warn!(dropped, "Inbound queue full, dropping datagram");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "UDP receive error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(_) => trace!("No datagram received (timeout)"),
        }
    }

    info!(datagrams, undecodable, dropped, "UDP receive loop stopped");
}

/// Frame a message as `<topic>\n<payload>`.
pub(crate) fn encode_datagram(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(topic.len() + 1 + payload.len());
    datagram.extend_from_slice(topic.as_bytes());
    datagram.push(b'\n');
    datagram.extend_from_slice(payload);
    datagram
}

/// Split a datagram into topic and payload.
pub(crate) fn decode_datagram(datagram: &[u8]) -> Option<Message> {
    let split = datagram.iter().position(|&b| b == b'\n')?;
    let topic = std::str::from_utf8(&datagram[..split]).ok()?.trim();
    if topic.is_empty() {
        return None;
    }
    Some(Message::new(topic, datagram[split + 1..].to_vec()))
}
