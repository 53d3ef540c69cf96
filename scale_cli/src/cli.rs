//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "scale_bridge",
    version,
    about = "USB HID scale to MQTT bridge"
)]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/scale_bridge.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge until interrupted
    Run {
        /// Use the built-in simulated scale instead of hidraw
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
    },
    /// Read and decode a single report, then exit
    SelfCheck {
        /// Use the built-in simulated scale instead of hidraw
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
    },
    /// Print the Home Assistant discovery messages without connecting
    Discovery,
}
