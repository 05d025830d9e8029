//! Schedule command - compute one cycle offline and print the command JSON.
//!
//! Uses the same store and scheduler path as the running controller, so the
//! output is exactly what `run` would publish for the given densities.

use std::path::PathBuf;

use clap::Args;
use signal_controller::clock::{Clock, SystemClock};
use signal_controller::config::{defaults, ConfigFile, IntersectionConfig};
use signal_controller::lane::{Lane, PerLane};
use signal_controller::scheduler::{compute_schedule, Feasibility};
use signal_controller::state::StateStore;
use signal_controller::telemetry::TelemetryReading;

use crate::error::CliError;

/// Arguments for the schedule command.
#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// North lane density in percent (omit to treat the lane as stale)
    #[arg(long, value_parser = parse_density)]
    pub north: Option<f64>,

    /// South lane density in percent
    #[arg(long, value_parser = parse_density)]
    pub south: Option<f64>,

    /// East lane density in percent
    #[arg(long, value_parser = parse_density)]
    pub east: Option<f64>,

    /// West lane density in percent
    #[arg(long, value_parser = parse_density)]
    pub west: Option<f64>,

    /// Intersection identifier for the payload
    #[arg(long, default_value = defaults::DEFAULT_INTERSECTION_ID)]
    pub intersection: String,

    /// Cycle length in seconds (overrides the config file)
    #[arg(long)]
    pub cycle_length: Option<u32>,

    /// Yellow seconds for every lane (overrides the config file)
    #[arg(long)]
    pub yellow: Option<u32>,

    /// Minimum green seconds per lane (overrides the config file)
    #[arg(long)]
    pub green_min: Option<u32>,

    /// Maximum green seconds per lane (overrides the config file)
    #[arg(long)]
    pub green_max: Option<u32>,
}

fn parse_density(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("{} is outside 0..=100", value));
    }
    Ok(value)
}

/// Run the schedule command.
pub fn run(args: ScheduleArgs, config_path: Option<PathBuf>) -> Result<(), CliError> {
    let config = match config_path {
        Some(path) => ConfigFile::load_from(&path)?,
        None => ConfigFile::load()?,
    };

    let mut settings = config.timing_for(&args.intersection);
    if let Some(cycle_length) = args.cycle_length {
        settings.cycle_length = cycle_length;
    }
    if let Some(yellow) = args.yellow {
        settings.yellow = yellow;
        settings.lane_yellow = PerLane::uniform(None);
    }
    if let Some(green_min) = args.green_min {
        settings.green_min = green_min;
    }
    if let Some(green_max) = args.green_max {
        settings.green_max = green_max;
    }
    let timing = settings.to_timing_config();
    timing
        .validate()
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let now = SystemClock.now();
    let store = StateStore::new(
        &[IntersectionConfig::new(args.intersection.clone(), timing)],
        defaults::DEFAULT_LATENCY_WINDOW,
        now,
    );

    let densities = PerLane::new([args.north, args.south, args.east, args.west]);
    for lane in Lane::ALL {
        if let Some(density_pct) = densities[lane] {
            let reading = TelemetryReading {
                intersection_id: args.intersection.clone(),
                lane,
                density_pct,
                queue_len: 0,
                seq: 0,
                ts: now,
            };
            store
                .apply(&reading, now)
                .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        }
    }

    let snapshot = store
        .snapshot(&args.intersection)
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    let outcome = compute_schedule(&snapshot, now);

    for lane in &outcome.stale_lanes {
        eprintln!("note: no density for {}, using neutral weight", lane);
    }
    if let Feasibility::Infeasible { remainder } = outcome.feasibility {
        eprintln!(
            "warning: green bounds {}..={}s cannot be met; {}s absorbed starting with north",
            timing.green_min(),
            timing.green_max(),
            remainder
        );
    }

    let json = serde_json::to_string_pretty(&outcome.schedule)
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
