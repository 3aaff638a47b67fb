//! Command-line front end for the sipprobe tool
//!
//! Parses arguments, installs logging and dispatches to one command per
//! subcommand. The probe commands run a single transaction and print its
//! transcript to stdout; `listen` is a raw line printer for checking what a
//! peer sends.

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::{Cli, Commands, ProbeArgs};
pub use logging::{parse_log_level, setup_logging, LoggingConfig};
