//! Command publishing with retry and fail-safe fallback.
//!
//! Each cycle's schedule is published to `traffic/<id>/commands`. Failed
//! attempts are retried with exponential backoff until the attempt budget
//! or the next cycle boundary runs out. If the fresh schedule never gets
//! through, the last schedule the transport accepted is re-sent so the
//! actuator keeps running a known-good plan. A schedule that was never
//! accepted is never recorded as published.

mod backoff;

pub use backoff::calculate_backoff;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::PublishConfig;
use crate::metrics::MetricsClient;
use crate::scheduler::PhaseSchedule;
use crate::state::StateStore;
use crate::transport::{command_topic, Transport, TransportError};

/// How a cycle's command ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The fresh schedule was accepted after `attempts` tries.
    Published { attempts: u32 },
    /// The fresh schedule failed `attempts` times; the previous one was re-sent.
    FellBack { attempts: u32 },
    /// Nothing reached the transport this cycle.
    Failed { attempts: u32 },
}

impl PublishOutcome {
    /// Attempts spent on the fresh schedule.
    pub fn attempts(&self) -> u32 {
        match *self {
            PublishOutcome::Published { attempts }
            | PublishOutcome::FellBack { attempts }
            | PublishOutcome::Failed { attempts } => attempts,
        }
    }

    /// Whether the actuator received some schedule this cycle.
    pub fn is_delivered(&self) -> bool {
        !matches!(self, PublishOutcome::Failed { .. })
    }
}

/// Why a single attempt failed.
#[derive(Debug)]
enum AttemptError {
    Transport(TransportError),
    TimedOut(Duration),
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Transport(e) => write!(f, "{e}"),
            AttemptError::TimedOut(after) => write!(f, "timed out after {after:?}"),
        }
    }
}

/// Publishes schedules for every intersection over one transport.
pub struct CommandPublisher<T> {
    transport: Arc<T>,
    store: Arc<StateStore>,
    clock: Arc<dyn Clock>,
    config: PublishConfig,
    metrics: MetricsClient,
}

impl<T: Transport> CommandPublisher<T> {
    pub fn new(
        transport: Arc<T>,
        store: Arc<StateStore>,
        clock: Arc<dyn Clock>,
        config: PublishConfig,
        metrics: MetricsClient,
    ) -> Self {
        Self {
            transport,
            store,
            clock,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Publish `schedule`, retrying until the end of its cycle.
    pub async fn publish(&self, schedule: &PhaseSchedule) -> PublishOutcome {
        let id = schedule.intersection_id.as_str();
        let topic = command_topic(id);
        let deadline = schedule.cycle_start_ts + f64::from(schedule.cycle_length);

        let payload = match schedule.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(intersection = %id, error = %e, "Failed to encode schedule");
                return self.fall_back(id, &topic, deadline, 0).await;
            }
        };

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            let remaining = self.remaining(deadline);
            if remaining.is_zero() {
                warn!(intersection = %id, attempts, "Cycle boundary reached while publishing");
                break;
            }

            attempts += 1;
            match self.attempt(&topic, payload.clone(), remaining).await {
                Ok(()) => {
                    if let Err(e) = self.store.record_published(id, schedule.clone()) {
                        warn!(intersection = %id, error = %e, "Published schedule not recorded");
                    }
                    self.metrics.publish_succeeded(attempts);
                    debug!(
                        intersection = %id,
                        cycle = schedule.cycle_count,
                        attempts,
                        "Schedule published"
                    );
                    return PublishOutcome::Published { attempts };
                }
                Err(e) => {
                    warn!(
                        intersection = %id,
                        cycle = schedule.cycle_count,
                        attempt = attempts,
                        max_attempts,
                        error = %e,
                        "Publish attempt failed"
                    );
                }
            }

            if attempts >= max_attempts {
                break;
            }
            let delay = calculate_backoff(
                self.config.base_delay,
                self.config.max_delay,
                attempts - 1,
            );
            if delay >= self.remaining(deadline) {
                warn!(intersection = %id, attempts, "No time left in cycle for another attempt");
                break;
            }
            self.metrics.publish_retried();
            tokio::time::sleep(delay).await;
        }

        error!(
            intersection = %id,
            cycle = schedule.cycle_count,
            attempts,
            "Schedule not delivered this cycle, falling back"
        );
        self.fall_back(id, &topic, deadline, attempts).await
    }

    async fn fall_back(&self, id: &str, topic: &str, deadline: f64, attempts: u32) -> PublishOutcome {
        let previous = match self.store.last_published(id) {
            Ok(Some(previous)) => previous,
            _ => {
                self.metrics.publish_failed();
                error!(
                    intersection = %id,
                    attempts,
                    "Publish failed and no previous schedule to fall back to"
                );
                return PublishOutcome::Failed { attempts };
            }
        };

        let remaining = self.remaining(deadline);
        let result = match previous.to_payload() {
            Ok(payload) if !remaining.is_zero() => self.attempt(topic, payload, remaining).await,
            Ok(_) => Err(AttemptError::TimedOut(Duration::ZERO)),
            Err(e) => {
                error!(intersection = %id, error = %e, "Failed to encode fallback schedule");
                Err(AttemptError::TimedOut(Duration::ZERO))
            }
        };

        match result {
            Ok(()) => {
                self.metrics.publish_fell_back();
                info!(
                    intersection = %id,
                    attempts,
                    fallback_cycle = previous.cycle_count,
                    "Fresh schedule failed, re-sent last known-good schedule"
                );
                PublishOutcome::FellBack { attempts }
            }
            Err(e) => {
                self.metrics.publish_failed();
                error!(
                    intersection = %id,
                    attempts,
                    error = %e,
                    "Publish and fallback both failed"
                );
                PublishOutcome::Failed { attempts }
            }
        }
    }

    /// One bounded publish call.
    async fn attempt(&self, topic: &str, payload: Vec<u8>, remaining: Duration) -> Result<(), AttemptError> {
        let limit = self.config.attempt_timeout.min(remaining);
        match tokio::time::timeout(limit, self.transport.publish(topic, payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AttemptError::Transport(e)),
            Err(_) => Err(AttemptError::TimedOut(limit)),
        }
    }

    fn remaining(&self, deadline: f64) -> Duration {
        let secs = deadline - self.clock.now();
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::config::{IntersectionConfig, TimingConfig};
    use crate::lane::PerLane;
    use crate::metrics::MetricEvent;
    use crate::transport::Message;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    /// Fails the first `failures` publishes, then accepts.
    struct FlakyTransport {
        failures: AtomicU32,
        hang: bool,
        sent: Mutex<Vec<Message>>,
    }

    impl FlakyTransport {
        fn failing(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicU32::new(failures),
                hang: false,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicU32::new(u32::MAX),
                hang: true,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<PhaseSchedule> {
            self.sent
                .lock()
                .iter()
                .map(|m| PhaseSchedule::from_payload(&m.payload).unwrap())
                .collect()
        }
    }

    impl Transport for FlakyTransport {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(TransportError::Rejected("broker unavailable".into()));
            }
            self.sent.lock().push(Message::new(topic, payload));
            Ok(())
        }
    }

    struct Fixture<T> {
        publisher: CommandPublisher<T>,
        store: Arc<StateStore>,
        events: mpsc::UnboundedReceiver<MetricEvent>,
    }

    fn fixture<T: Transport>(transport: Arc<T>) -> Fixture<T> {
        let store = Arc::new(StateStore::new(
            &[IntersectionConfig::new("i1", TimingConfig::default())],
            30,
            1_000.0,
        ));
        let (tx, events) = mpsc::unbounded_channel();
        let publisher = CommandPublisher::new(
            transport,
            Arc::clone(&store),
            Arc::new(TokioClock::starting_at(1_000.0)),
            PublishConfig::default(),
            MetricsClient::new(tx),
        );
        Fixture {
            publisher,
            store,
            events,
        }
    }

    fn schedule(cycle_count: u64, north: u32) -> PhaseSchedule {
        PhaseSchedule::new(
            "i1",
            1_000.0,
            60,
            cycle_count,
            PerLane::new([north, 34 - north, 7, 7]),
            PerLane::uniform(3),
        )
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<MetricEvent>) -> Vec<MetricEvent> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_succeeds() {
        let transport = FlakyTransport::failing(0);
        let mut fx = fixture(Arc::clone(&transport));

        let outcome = fx.publisher.publish(&schedule(1, 27)).await;
        assert_eq!(outcome, PublishOutcome::Published { attempts: 1 });
        assert_eq!(fx.store.last_published("i1").unwrap(), Some(schedule(1, 27)));
        assert_eq!(
            drain(&mut fx.events),
            vec![MetricEvent::PublishSucceeded { attempts: 1 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_succeeds() {
        let transport = FlakyTransport::failing(2);
        let mut fx = fixture(Arc::clone(&transport));
        let started = tokio::time::Instant::now();

        let outcome = fx.publisher.publish(&schedule(1, 27)).await;
        assert_eq!(outcome, PublishOutcome::Published { attempts: 3 });
        // 100ms + 200ms of backoff.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(
            drain(&mut fx.events),
            vec![
                MetricEvent::PublishRetried,
                MetricEvent::PublishRetried,
                MetricEvent::PublishSucceeded { attempts: 3 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fall_back_to_previous() {
        let transport = FlakyTransport::failing(0);
        let fx = fixture(Arc::clone(&transport));
        fx.publisher.publish(&schedule(1, 27)).await;

        // Four failures exhaust the budget; the fifth call is the fallback.
        transport.failures.store(4, Ordering::SeqCst);
        let outcome = fx.publisher.publish(&schedule(2, 28)).await;

        assert_eq!(outcome, PublishOutcome::FellBack { attempts: 4 });
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], schedule(1, 27));
        // The failed schedule never becomes the known-good one.
        assert_eq!(fx.store.last_published("i1").unwrap(), Some(schedule(1, 27)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_fallback_still_logs_cycle_failure() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = FlakyTransport::failing(0);
        let fx = fixture(Arc::clone(&transport));
        fx.publisher.publish(&schedule(1, 27)).await;
        transport.failures.store(4, Ordering::SeqCst);
        let outcome = fx.publisher.publish(&schedule(2, 28)).await;

        assert_eq!(outcome, PublishOutcome::FellBack { attempts: 4 });
        let text = logs.text();
        let line = text
            .lines()
            .find(|l| l.contains("Schedule not delivered this cycle"))
            .expect("cycle failure logged");
        assert!(line.contains("ERROR"));
        assert!(line.contains("intersection=i1"));
        assert!(line.contains("cycle=2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_previous_schedule_fails() {
        let transport = FlakyTransport::failing(10);
        let mut fx = fixture(Arc::clone(&transport));

        let outcome = fx.publisher.publish(&schedule(1, 27)).await;
        assert_eq!(outcome, PublishOutcome::Failed { attempts: 4 });
        assert!(!outcome.is_delivered());
        assert_eq!(fx.store.last_published("i1").unwrap(), None);
        assert_eq!(
            drain(&mut fx.events).last(),
            Some(&MetricEvent::PublishFailed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_transport_is_bounded_by_attempt_timeout() {
        let transport = FlakyTransport::hanging();
        let fx = fixture(Arc::clone(&transport));
        let started = tokio::time::Instant::now();

        let outcome = fx.publisher.publish(&schedule(1, 27)).await;
        assert_eq!(outcome, PublishOutcome::Failed { attempts: 4 });
        // 4 × 1s timeouts plus 100 + 200 + 400ms of backoff.
        assert_eq!(started.elapsed(), Duration::from_millis(4_700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_cycle_boundary() {
        let transport = FlakyTransport::hanging();
        let mut fx = fixture(Arc::clone(&transport));
        fx.publisher.config.max_attempts = 1_000;
        let started = tokio::time::Instant::now();

        // Cycle ends at 1002: only two seconds of budget.
        let mut short = schedule(1, 27);
        short.cycle_length = 2;
        let outcome = fx.publisher.publish(&short).await;

        assert!(matches!(outcome, PublishOutcome::Failed { .. }));
        assert!(started.elapsed() <= Duration::from_millis(2_010));
        assert!(drain(&mut fx.events).contains(&MetricEvent::PublishFailed));
    }
}
