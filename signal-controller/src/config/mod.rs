//! Configuration for the signal controller.
//!
//! Two layers:
//!
//! - [`ConfigFile`]: the user-facing INI file (`~/.signal-controller/config.ini`)
//!   with one settings struct per section.
//! - [`ControllerConfig`], [`TimingConfig`], [`PublishConfig`]: validated
//!   runtime values consumed by the controller.
//!
//! # Example
//!
//! ```
//! use signal_controller::config::{ConfigFile, TimingConfig};
//!
//! let file = ConfigFile::default();
//! let runtime = file.controller_config().unwrap();
//! assert_eq!(runtime.intersections[0].timing, TimingConfig::default());
//! ```

mod controller;
pub mod defaults;
mod file;
mod parser;
mod settings;
mod timing;
mod writer;

pub use controller::{ControllerConfig, IntersectionConfig, PublishConfig};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, ControllerSettings, LoggingSettings, MonitorSettings, PublishSettings,
    TimingOverrides, TimingSettings, TransportSettings,
};
pub use timing::{BoundsConflict, TimingConfig, TimingError};
