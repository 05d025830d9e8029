//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use signal_controller::config::ConfigFileError;
use signal_controller::controller::ControllerError;
use signal_controller::transport::TransportError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read, parsed or written
    Config(ConfigFileError),
    /// Invalid command-line input
    InvalidArgument(String),
    /// Controller refused to start
    Controller(ControllerError),
    /// Transport could not be set up
    Transport(TransportError),
    /// Async runtime or signal handler setup failed
    Runtime(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(ConfigFileError::InvalidValue { section, key, .. }) => {
                eprintln!();
                eprintln!("Fix '{}' in the [{}] section of the config file.", key, section);
                eprintln!("Run 'signalctl config path' to locate it.");
            }
            CliError::Transport(TransportError::Bind { .. }) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Another controller is already listening on this port");
                eprintln!("  2. listen_addr in [transport] names an address this host does not own");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Controller(e) => write!(f, "Failed to start controller: {}", e),
            CliError::Transport(e) => write!(f, "Transport error: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Controller(e) => Some(e),
            CliError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<ControllerError> for CliError {
    fn from(e: ControllerError) -> Self {
        CliError::Controller(e)
    }
}

impl From<TransportError> for CliError {
    fn from(e: TransportError) -> Self {
        CliError::Transport(e)
    }
}
