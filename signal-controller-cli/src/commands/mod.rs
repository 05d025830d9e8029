//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`run`] - Main command (run the controller until Ctrl-C)
//! - [`schedule`] - One-shot offline schedule computation

pub mod config;
pub mod run;
pub mod schedule;
