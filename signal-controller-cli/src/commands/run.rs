//! Run command - drive every configured intersection until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use signal_controller::clock::{Clock, SystemClock};
use signal_controller::config::ControllerConfig;
use signal_controller::controller::{Controller, MetricsHandles};
use signal_controller::metrics::MetricsSystem;
use signal_controller::monitor::{ControllerReport, StateQuery};
use signal_controller::transport::{UdpTransport, UdpTransportConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Default)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub debug: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config.as_deref(), args.debug)?;
    runner.log_startup("run");
    let config = runner.config();

    let controller_config = config.controller_config()?;
    let transport_config = config.transport_config();
    let report_interval = config.report_interval();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("signal-controller")
        .build()
        .map_err(|e| CliError::Runtime(format!("Failed to create tokio runtime: {}", e)))?;

    // Set up signal handler for graceful shutdown
    let shutdown = CancellationToken::new();
    let shutdown_on_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_on_signal.cancel();
    })
    .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    println!("Signal controller v{}", signal_controller::VERSION);
    println!(
        "Managing {} intersection(s), listening on {}",
        controller_config.intersections.len(),
        transport_config.listen_addr
    );
    println!("Press Ctrl-C to stop.");

    runtime.block_on(serve(
        controller_config,
        transport_config,
        report_interval,
        shutdown,
    ))
}

async fn serve(
    controller_config: ControllerConfig,
    transport_config: UdpTransportConfig,
    report_interval: Duration,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    let metrics = MetricsSystem::new(&tokio::runtime::Handle::current());
    let transport_shutdown = shutdown.child_token();
    let (transport, subscription, receive_task) =
        UdpTransport::bind(transport_config, transport_shutdown.clone()).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let handle = match Controller::start(
        &controller_config,
        Arc::new(transport),
        subscription,
        clock,
        MetricsHandles::new(metrics.client(), metrics.state_handle()),
    ) {
        Ok(handle) => handle,
        Err(e) => {
            transport_shutdown.cancel();
            metrics.shutdown().await;
            return Err(e.into());
        }
    };

    let monitor = handle.monitor();
    let mut ticker = tokio::time::interval(report_interval.max(Duration::from_secs(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => log_report(&monitor.report()),
        }
    }

    info!("Shutdown requested");
    println!();
    println!("Shutting down...");

    let stats = handle.shutdown().await;
    transport_shutdown.cancel();
    if let Err(e) = receive_task.await {
        error!("UDP receive task panicked: {}", e);
    }

    let final_report = monitor.report();
    log_report(&final_report);
    metrics.shutdown().await;

    println!(
        "Processed {} telemetry message(s), {} rejected",
        stats.messages, stats.rejected
    );
    println!(
        "Delivered {} cycle command(s), {} via fallback",
        final_report.counters.cycles_delivered(),
        final_report.counters.publish_fallbacks
    );
    Ok(())
}

/// Write one status line per intersection plus the process counters.
fn log_report(report: &ControllerReport) {
    for intersection in &report.intersections {
        let densities: Vec<String> = intersection
            .lanes
            .iter()
            .map(|l| format!("{}={:.0}%", l.lane, l.density_pct))
            .collect();
        let greens: Vec<String> = intersection
            .lanes
            .iter()
            .map(|l| format!("{}={}s", l.lane, l.green))
            .collect();
        let stale: Vec<String> = intersection
            .lanes
            .iter()
            .filter(|l| l.stale)
            .map(|l| l.lane.to_string())
            .collect();

        info!(
            intersection = %intersection.intersection_id,
            cycle = intersection.cycle_count,
            density = %densities.join(" "),
            green = %greens.join(" "),
            stale = %stale.join(","),
            latency_ms = intersection.latency_ms.map(|l| l.mean_ms),
            received = intersection.messages_received,
            lost = intersection.messages_lost,
            "Intersection status"
        );
    }

    let counters = &report.counters;
    info!(
        loss_ratio = counters.loss_ratio(),
        malformed = counters.telemetry_malformed,
        clock_skew = counters.clock_skew_events,
        retries = counters.publish_retries,
        fallbacks = counters.publish_fallbacks,
        failures = counters.publish_failures,
        infeasible = counters.infeasible_cycles,
        "Controller status"
    );
}
