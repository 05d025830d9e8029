//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path` and `config show`.

use std::path::Path;

use clap::Subcommand;
use signal_controller::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Path => run_path(&path),
        ConfigCommands::Show => run_show(&path),
    }
}

/// Write the default configuration.
fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        println!("Configuration already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(path)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Show the configuration file path.
fn run_path(path: &Path) -> Result<(), CliError> {
    println!("{}", path.display());
    Ok(())
}

/// Print the effective configuration, per intersection.
fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    if !path.exists() {
        println!("(no file at {}, showing defaults)", path.display());
        println!();
    }

    println!("Signal Controller Configuration");
    println!("===============================");
    println!();

    for id in &config.controller.intersections {
        let timing = config.timing_for(id).to_timing_config();
        let [north, south, east, west] = *timing.yellows().as_array();
        println!("[{}]", id);
        println!("  cycle_length   = {}s", timing.cycle_length());
        println!(
            "  yellow         = {} / {} / {} / {} (n/s/e/w)",
            north, south, east, west
        );
        println!("  available      = {}s", timing.available_green());
        println!(
            "  green bounds   = {}..={}s",
            timing.green_min(),
            timing.green_max()
        );
        println!(
            "  staleness      = {}s",
            timing.staleness_window().as_secs_f64()
        );
        if timing.bounds_conflict().is_some() {
            println!("  (bounds cannot all be met; see 'signalctl run' warnings)");
        }
        println!();
    }

    println!("[publish]");
    println!("  max_attempts   = {}", config.publish.max_attempts);
    println!(
        "  backoff        = {}ms .. {}ms",
        config.publish.base_delay_ms, config.publish.max_delay_ms
    );
    println!("  attempt limit  = {}ms", config.publish.attempt_timeout_ms);
    println!();
    println!("[transport]");
    println!("  listen_addr    = {}", config.transport.listen_addr);
    let peers: Vec<String> = config
        .transport
        .command_peers
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("  command_peers  = {}", peers.join(", "));
    println!();
    println!("[logging]");
    println!("  file           = {}", config.logging.file.display());

    Ok(())
}
