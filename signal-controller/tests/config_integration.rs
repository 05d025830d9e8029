//! Integration tests for configuration files.
//!
//! Covers the path from an INI file on disk to a running controller:
//! - Save / reload of a customised configuration
//! - Per-intersection overrides reaching the scheduler
//! - Rejection of unschedulable timing with the offending key named

use std::sync::Arc;
use std::time::Duration;

use signal_controller::clock::TokioClock;
use signal_controller::config::{ConfigFile, ConfigFileError, TimingOverrides};
use signal_controller::controller::{Controller, MetricsHandles};
use signal_controller::lane::Lane;
use signal_controller::scheduler::PhaseSchedule;
use signal_controller::transport::topic::TELEMETRY_FILTER;
use signal_controller::transport::MemoryBroker;
use tempfile::TempDir;

fn customised() -> ConfigFile {
    let mut config = ConfigFile::default();
    config.controller.intersections = vec!["main_and_5th".into(), "harbor".into()];
    config.timing.cycle_length = 90;
    config.timing.green_max = 45;
    config.publish.max_attempts = 6;
    config.monitor.latency_window = 50;
    config.overrides.insert(
        "harbor".into(),
        TimingOverrides {
            cycle_length: Some(40),
            yellow: Some(2),
            green_min: Some(4),
            green_max: Some(20),
            ..TimingOverrides::default()
        },
    );
    config
}

#[test]
fn test_saved_config_reloads_identically() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested/config.ini");

    let config = customised();
    config.save_to(&path).unwrap();
    let reloaded = ConfigFile::load_from(&path).unwrap();

    assert_eq!(reloaded, config);
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
    assert_eq!(config, ConfigFile::default());
}

#[test]
fn test_unschedulable_override_names_its_section() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.ini");
    std::fs::write(
        &path,
        "[controller]\nintersections = a, b\n\n[intersection.b]\ncycle_length = 10\n",
    )
    .unwrap();

    match ConfigFile::load_from(&path) {
        Err(ConfigFileError::InvalidValue { section, key, .. }) => {
            assert_eq!(section, "intersection.b");
            assert_eq!(key, "cycle_length");
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_file_config_drives_the_controller() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.ini");
    customised().save_to(&path).unwrap();

    let controller_config = ConfigFile::load_from(&path)
        .unwrap()
        .controller_config()
        .unwrap();
    assert_eq!(controller_config.publish.max_attempts, 6);
    assert_eq!(controller_config.latency_window, 50);

    let broker = MemoryBroker::new();
    let mut commands = broker.subscribe("traffic/+/commands", 16);
    let handle = Controller::start(
        &controller_config,
        Arc::new(broker.clone()),
        broker.subscribe(TELEMETRY_FILTER, 16),
        Arc::new(TokioClock::starting_at(5_000.0)),
        MetricsHandles::detached(),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let mut sent: Vec<PhaseSchedule> = std::iter::from_fn(|| commands.try_recv())
        .map(|m| PhaseSchedule::from_payload(&m.payload).unwrap())
        .collect();
    sent.sort_by(|a, b| a.intersection_id.cmp(&b.intersection_id));

    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].intersection_id, "harbor");
    assert_eq!(sent[0].cycle_length, 40);
    assert_eq!(sent[0].green(Lane::West), 8);
    assert_eq!(sent[1].intersection_id, "main_and_5th");
    assert_eq!(sent[1].cycle_length, 90);
    // 19.5s each rounds to 20; the 2s excess comes off north and south.
    assert_eq!(sent[1].green(Lane::North), 19);
    assert_eq!(sent[1].green(Lane::West), 20);

    handle.shutdown().await;
}
