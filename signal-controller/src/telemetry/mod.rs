//! Telemetry ingest.
//!
//! Validates inbound sensor messages and forwards accepted readings to the
//! [`StateStore`]. Rejected messages are counted and logged, never applied.
//!
//! # Example
//!
//! ```ignore
//! let ingest = Arc::new(TelemetryIngest::new(store, metrics.client()));
//! let receiver = TelemetryReceiver::new(ingest, clock, Duration::from_millis(500));
//! let handle = tokio::spawn(receiver.run(subscription, shutdown));
//! ```

mod reading;
mod receiver;

pub use reading::{parse_telemetry, Ingested, MalformedReason, MalformedTelemetry, TelemetryReading};
pub use receiver::{ReceiverStats, TelemetryReceiver};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::lane::Lane;
use crate::metrics::MetricsClient;
use crate::state::{ApplyOutcome, Disposition, StateStore};
use crate::transport::Message;

/// Malformed messages logged at warn before dropping to debug.
const MALFORMED_WARN_LIMIT: u64 = 10;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Applied {
        intersection_id: String,
        lane: Lane,
        outcome: ApplyOutcome,
    },
    Rejected(MalformedTelemetry),
}

/// Validation front-end of the state store.
#[derive(Debug)]
pub struct TelemetryIngest {
    store: Arc<StateStore>,
    metrics: MetricsClient,
    malformed: AtomicU64,
}

impl TelemetryIngest {
    pub fn new(store: Arc<StateStore>, metrics: MetricsClient) -> Self {
        Self {
            store,
            metrics,
            malformed: AtomicU64::new(0),
        }
    }

    /// Validate `message` and apply it if well-formed.
    ///
    /// Duplicates are applied too; the store decides they change nothing
    /// but the receive counters and latency samples.
    pub fn handle(&self, message: &Message, receipt_time: f64) -> IngestOutcome {
        let reading = match parse_telemetry(&message.topic, &message.payload, |id| {
            self.store.contains(id)
        }) {
            Ingested::Valid(reading) => reading,
            Ingested::Malformed(malformed) => return self.reject(malformed),
        };

        match self.store.apply(&reading, receipt_time) {
            Ok(outcome) => {
                match outcome.disposition {
                    Disposition::InOrder => self.metrics.telemetry_accepted(0),
                    Disposition::Gap { lost } => self.metrics.telemetry_accepted(lost),
                    Disposition::Stale => self.metrics.telemetry_duplicate(),
                }
                if outcome.clock_skew {
                    self.metrics.clock_skew();
                }
                IngestOutcome::Applied {
                    intersection_id: reading.intersection_id,
                    lane: reading.lane,
                    outcome,
                }
            }
            Err(_) => self.reject(MalformedTelemetry {
                topic: message.topic.clone(),
                reason: MalformedReason::UnknownIntersection(reading.intersection_id),
            }),
        }
    }

    /// Messages rejected since startup.
    pub fn malformed_count(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    fn reject(&self, malformed: MalformedTelemetry) -> IngestOutcome {
        let count = self.malformed.fetch_add(1, Ordering::Relaxed) + 1;
        self.metrics.telemetry_malformed(malformed.reason.kind());

        if count <= MALFORMED_WARN_LIMIT {
            warn!(
                topic = %malformed.topic,
                kind = malformed.reason.kind(),
                count,
                "Rejected telemetry: {}",
                malformed.reason
            );
        } else {
            debug!(
                topic = %malformed.topic,
                kind = malformed.reason.kind(),
                count,
                "Rejected telemetry: {}",
                malformed.reason
            );
        }
        IngestOutcome::Rejected(malformed)
    }
}
