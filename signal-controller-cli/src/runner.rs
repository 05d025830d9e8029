//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading and logging initialization so command
//! handlers start from a ready environment.

use std::path::{Path, PathBuf};

use crate::error::CliError;
use signal_controller::config::{config_file_path, ConfigFile};
use signal_controller::logging::{init_logging, LoggingGuard, LoggingOptions};
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
    /// Where the configuration was loaded from
    config_path: PathBuf,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file to use instead of the default location
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn new(config_path: Option<&Path>, debug_mode: bool) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging_guard = init_logging(
            &config.logging.file,
            LoggingOptions {
                stdout: true,
                debug: debug_mode,
            },
        )
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("Signal controller v{}", signal_controller::VERSION);
        info!(
            config = %self.config_path.display(),
            "signalctl: {} command", command
        );
    }
}
