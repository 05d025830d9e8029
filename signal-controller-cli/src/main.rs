//! Signal controller CLI - Command-line interface
//!
//! This binary runs the adaptive signal controller and provides offline
//! tools around it.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;
use commands::schedule::ScheduleArgs;

#[derive(Parser)]
#[command(name = "signalctl")]
#[command(version = signal_controller::VERSION)]
#[command(about = "Adaptive traffic-signal controller", long_about = None)]
struct Cli {
    /// Config file (default: ~/.signal-controller/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller until Ctrl-C
    Run {
        /// Enable debug-level logging
        #[arg(long)]
        debug: bool,
    },

    /// Compute one cycle from given densities and print the command JSON
    Schedule(ScheduleArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { debug } => commands::run::run(RunArgs {
            config: cli.config,
            debug,
        }),
        Commands::Schedule(args) => commands::schedule::run(args, cli.config),
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    };

    if let Err(e) = result {
        e.exit();
    }
}
