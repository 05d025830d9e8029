//! Controller runtime.
//!
//! Wires the pieces into running tasks:
//!
//! ```text
//!   Subscription ──► TelemetryReceiver ──► TelemetryIngest ──► StateStore
//!                                                                 │
//!   cycle timer (one task per intersection)                       │ snapshot
//!        └──► Controller::run_cycle ──► compute_schedule ◄─────────┘
//!                                          │
//!                                          ▼
//!                                  CommandPublisher ──► Transport
//! ```
//!
//! Telemetry arrival and the cycle timers are independent: a cycle task
//! only ever reads a snapshot, and the receiver only ever applies
//! readings, so neither can stall the other.

mod error;

pub use error::ControllerError;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::ControllerConfig;
use crate::lane::Lane;
use crate::metrics::{MetricsClient, SharedMetricsState};
use crate::monitor::Monitor;
use crate::publisher::{CommandPublisher, PublishOutcome};
use crate::scheduler::{compute_schedule, Feasibility, PhaseSchedule};
use crate::state::StateStore;
use crate::telemetry::{ReceiverStats, TelemetryIngest, TelemetryReceiver};
use crate::transport::{Subscription, Transport};

/// What one scheduling step did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub schedule: PhaseSchedule,
    pub stale_lanes: Vec<Lane>,
    pub feasibility: Feasibility,
    pub skipped_cycles: u64,
    pub publish: PublishOutcome,
}

/// Metrics wiring for [`Controller::start`].
#[derive(Debug, Clone)]
pub struct MetricsHandles {
    pub client: MetricsClient,
    /// Counter state for the monitor, if a daemon is running.
    pub state: Option<SharedMetricsState>,
}

impl MetricsHandles {
    pub fn new(client: MetricsClient, state: SharedMetricsState) -> Self {
        Self {
            client,
            state: Some(state),
        }
    }

    /// No daemon; events are discarded and the monitor reports zero counters.
    pub fn detached() -> Self {
        Self {
            client: MetricsClient::detached(),
            state: None,
        }
    }
}

/// Scheduling authority for a set of intersections.
pub struct Controller<T> {
    store: Arc<StateStore>,
    publisher: CommandPublisher<T>,
    clock: Arc<dyn Clock>,
    metrics: MetricsClient,
}

impl<T: Transport + 'static> Controller<T> {
    /// Build the store and publisher for `config`.
    ///
    /// The first cycle of every intersection starts at the clock's current
    /// time.
    pub fn new(
        config: &ControllerConfig,
        transport: Arc<T>,
        clock: Arc<dyn Clock>,
        metrics: MetricsClient,
    ) -> Result<Self, ControllerError> {
        if config.intersections.is_empty() {
            return Err(ControllerError::NoIntersections);
        }
        config
            .validate()
            .map_err(|(id, source)| ControllerError::InvalidTiming { id, source })?;

        let store = Arc::new(StateStore::new(
            &config.intersections,
            config.latency_window,
            clock.now(),
        ));
        let publisher = CommandPublisher::new(
            transport,
            Arc::clone(&store),
            Arc::clone(&clock),
            config.publish,
            metrics.clone(),
        );

        Ok(Self {
            store,
            publisher,
            clock,
            metrics,
        })
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Compute, commit and publish the next cycle for `id`.
    pub async fn run_cycle(&self, id: &str) -> Result<CycleReport, ControllerError> {
        let snapshot = self.store.snapshot(id)?;
        let now = self.clock.now();
        let outcome = compute_schedule(&snapshot, now);
        let schedule = outcome.schedule;

        if outcome.skipped_cycles > 0 {
            warn!(
                intersection = %id,
                skipped = outcome.skipped_cycles,
                cycle = schedule.cycle_count,
                "Cycle timer fell behind, skipping to current boundary"
            );
            self.metrics.cycles_skipped(outcome.skipped_cycles);
        }
        if let Feasibility::Infeasible { remainder } = outcome.feasibility {
            warn!(
                intersection = %id,
                remainder,
                green_min = snapshot.timing.green_min(),
                green_max = snapshot.timing.green_max(),
                "Green bounds cannot all be met, remainder absorbed from north"
            );
        }
        if !outcome.stale_lanes.is_empty() {
            debug!(
                intersection = %id,
                stale = ?outcome.stale_lanes,
                "Stale lanes scheduled with neutral weight"
            );
        }

        self.store.commit_cycle(id, &schedule)?;
        self.metrics.cycle_scheduled(
            outcome.stale_lanes.len() as u32,
            !outcome.feasibility.is_feasible(),
        );
        info!(
            intersection = %id,
            cycle = schedule.cycle_count,
            start = schedule.cycle_start_ts,
            north = schedule.green(Lane::North),
            south = schedule.green(Lane::South),
            east = schedule.green(Lane::East),
            west = schedule.green(Lane::West),
            "Cycle scheduled"
        );

        let publish = self.publisher.publish(&schedule).await;

        Ok(CycleReport {
            schedule,
            stale_lanes: outcome.stale_lanes,
            feasibility: outcome.feasibility,
            skipped_cycles: outcome.skipped_cycles,
            publish,
        })
    }

    /// Time until `id`'s current cycle ends.
    fn until_next_boundary(&self, id: &str) -> Result<Duration, ControllerError> {
        let snapshot = self.store.snapshot(id)?;
        let boundary = snapshot.cycle_start_ts + f64::from(snapshot.timing.cycle_length());
        let wait = boundary - self.clock.now();
        Ok(if wait.is_finite() && wait > 0.0 {
            Duration::from_secs_f64(wait)
        } else {
            Duration::ZERO
        })
    }

    /// Start the receiver and one cycle task per intersection.
    pub fn start(
        config: &ControllerConfig,
        transport: Arc<T>,
        subscription: Subscription,
        clock: Arc<dyn Clock>,
        metrics: MetricsHandles,
    ) -> Result<ControllerHandle, ControllerError> {
        let controller = Arc::new(Self::new(
            config,
            transport,
            Arc::clone(&clock),
            metrics.client.clone(),
        )?);
        let shutdown = CancellationToken::new();

        let ingest = Arc::new(TelemetryIngest::new(
            Arc::clone(&controller.store),
            metrics.client.clone(),
        ));
        let receiver = TelemetryReceiver::new(ingest, Arc::clone(&clock), config.recv_timeout);
        let receiver_shutdown = shutdown.clone();
        let receiver_handle =
            tokio::spawn(async move { receiver.run(subscription, receiver_shutdown).await });

        let cycle_handles: Vec<JoinHandle<()>> = controller
            .store
            .ids()
            .into_iter()
            .map(|id| {
                let controller = Arc::clone(&controller);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { controller.cycle_loop(id, shutdown).await })
            })
            .collect();

        info!(
            intersections = cycle_handles.len(),
            "Signal controller started"
        );

        Ok(ControllerHandle {
            monitor: Monitor::new(Arc::clone(&controller.store), metrics.state, clock),
            shutdown,
            receiver: Some(receiver_handle),
            cycles: cycle_handles,
        })
    }

    async fn cycle_loop(&self, id: String, shutdown: CancellationToken) {
        debug!(intersection = %id, "Cycle task started");
        loop {
            let wait = match self.until_next_boundary(&id) {
                Ok(wait) => wait,
                Err(e) => {
                    error!(intersection = %id, error = %e, "Cycle task stopping");
                    break;
                }
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            // A cancelled publish is dropped between attempts, never mid-send.
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.run_cycle(&id) => {
                    if let Err(e) = result {
                        error!(intersection = %id, error = %e, "Cycle failed");
                    }
                }
            }
        }
        debug!(intersection = %id, "Cycle task stopped");
    }
}

/// Handle to a running controller.
pub struct ControllerHandle {
    monitor: Monitor,
    shutdown: CancellationToken,
    receiver: Option<JoinHandle<ReceiverStats>>,
    cycles: Vec<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Read-only state query for the running controller.
    pub fn monitor(&self) -> Monitor {
        self.monitor.clone()
    }

    /// Token cancelled when the controller shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop every task and wait for them to finish.
    pub async fn shutdown(mut self) -> ReceiverStats {
        info!("Shutting down signal controller");
        self.shutdown.cancel();

        for handle in self.cycles.drain(..) {
            if let Err(e) = handle.await {
                error!("Cycle task panicked: {}", e);
            }
        }

        let stats = match self.receiver.take() {
            Some(handle) => match handle.await {
                Ok(stats) => stats,
                Err(e) => {
                    error!("Telemetry receiver panicked: {}", e);
                    ReceiverStats::default()
                }
            },
            None => ReceiverStats::default(),
        };

        info!(
            messages = stats.messages,
            applied = stats.applied,
            rejected = stats.rejected,
            "Signal controller stopped"
        );
        stats
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
