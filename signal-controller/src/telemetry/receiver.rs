//! Telemetry receive loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{IngestOutcome, TelemetryIngest};
use crate::clock::Clock;
use crate::transport::{Message, Received, Subscription};

/// Consecutive silent receive timeouts between "waiting" log lines.
const WAITING_LOG_EVERY: u64 = 20;

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub messages: u64,
    pub applied: u64,
    pub rejected: u64,
}

/// Drains a telemetry subscription into a [`TelemetryIngest`].
pub struct TelemetryReceiver {
    ingest: Arc<TelemetryIngest>,
    clock: Arc<dyn Clock>,
    recv_timeout: Duration,
}

impl TelemetryReceiver {
    pub fn new(ingest: Arc<TelemetryIngest>, clock: Arc<dyn Clock>, recv_timeout: Duration) -> Self {
        Self {
            ingest,
            clock,
            recv_timeout,
        }
    }

    /// Run until `shutdown` is cancelled or the subscription closes.
    pub async fn run(self, mut subscription: Subscription, shutdown: CancellationToken) -> ReceiverStats {
        info!(recv_timeout_ms = self.recv_timeout.as_millis() as u64, "Telemetry receiver started");

        let mut stats = ReceiverStats::default();
        let mut silent_timeouts: u64 = 0;

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Telemetry receiver cancelled");
                    break;
                }
                r = subscription.recv_timeout(self.recv_timeout) => r,
            };

            match received {
                Received::Message(message) => {
                    silent_timeouts = 0;
                    stats.messages += 1;
                    self.log_first_message(stats.messages, &message);

                    let receipt_time = self.clock.now();
                    match self.ingest.handle(&message, receipt_time) {
                        IngestOutcome::Applied { .. } => stats.applied += 1,
                        IngestOutcome::Rejected(_) => stats.rejected += 1,
                    }
                }
                Received::TimedOut => {
                    silent_timeouts += 1;
                    self.log_waiting(stats.messages, silent_timeouts);
                    trace!("No telemetry received (timeout)");
                }
                Received::Closed => {
                    debug!("Telemetry subscription closed, stopping receiver");
                    break;
                }
            }
        }

        info!(
            messages = stats.messages,
            applied = stats.applied,
            rejected = stats.rejected,
            "Telemetry receiver stopped"
        );
        stats
    }

    fn log_first_message(&self, messages: u64, message: &Message) {
        if messages == 1 {
            info!(
                topic = %message.topic,
                len = message.payload.len(),
                "Received first telemetry message"
            );
        }
    }

    fn log_waiting(&self, messages: u64, silent_timeouts: u64) {
        if silent_timeouts % WAITING_LOG_EVERY == 0 {
            let silent_secs = silent_secs(self.recv_timeout, silent_timeouts);
            if messages == 0 {
                info!(silent_secs, "Waiting for telemetry...");
            } else {
                info!(silent_secs, messages, "Telemetry has gone quiet");
            }
        }
    }
}

/// Whole seconds spent in `timeouts` consecutive receive timeouts.
fn silent_secs(recv_timeout: Duration, timeouts: u64) -> u64 {
    let millis = recv_timeout.as_millis().saturating_mul(u128::from(timeouts));
    u64::try_from(millis / 1000).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::config::{IntersectionConfig, TimingConfig};
    use crate::lane::Lane;
    use crate::metrics::MetricsClient;
    use crate::state::StateStore;
    use crate::transport::telemetry_topic;

    fn receiver() -> (TelemetryReceiver, Arc<StateStore>) {
        let store = Arc::new(StateStore::new(
            &[IntersectionConfig::new("i1", TimingConfig::default())],
            30,
            1_000.0,
        ));
        let ingest = Arc::new(TelemetryIngest::new(
            Arc::clone(&store),
            MetricsClient::detached(),
        ));
        let clock = Arc::new(TokioClock::starting_at(1_000.0));
        (
            TelemetryReceiver::new(ingest, clock, Duration::from_millis(100)),
            store,
        )
    }

    fn reading(seq: u64) -> Message {
        let payload = serde_json::json!({
            "intersection_id": "i1",
            "lane": "north",
            "density_pct": 55.0,
            "queue_len": 5,
            "seq": seq,
            "ts": 1_000.0,
        });
        Message::new(telemetry_topic("i1", Lane::North.as_str()), payload.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_until_closed() {
        let (receiver, store) = receiver();
        let (tx, subscription) = Subscription::channel(8);

        tx.send(reading(0)).await.unwrap();
        tx.send(Message::new("traffic/i1/north/density", "[]"))
            .await
            .unwrap();
        tx.send(reading(1)).await.unwrap();
        drop(tx);

        let stats = receiver.run(subscription, CancellationToken::new()).await;
        assert_eq!(
            stats,
            ReceiverStats {
                messages: 3,
                applied: 2,
                rejected: 1
            }
        );
        assert_eq!(
            store.snapshot("i1").unwrap().lanes[Lane::North].last_seq,
            Some(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_cancel_while_silent() {
        let (receiver, _store) = receiver();
        let (_tx, subscription) = Subscription::channel(8);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(receiver.run(subscription, shutdown.clone()));
        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.cancel();

        let stats = handle.await.unwrap();
        assert_eq!(stats.messages, 0);
    }

    #[test]
    fn test_silent_secs_beyond_u32_timeouts() {
        let timeout = Duration::from_millis(250);
        assert_eq!(silent_secs(timeout, 20), 5);

        let many = u64::from(u32::MAX) + 21;
        assert_eq!(silent_secs(timeout, many), many / 4);
        assert_eq!(silent_secs(Duration::from_secs(u64::MAX), u64::MAX), u64::MAX);
    }
}
