//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tofcam", version, about = "ToF camera tools")]
pub struct Cli {
    /// Path to config TOML; built-in defaults are used when the file is
    /// absent.
    #[arg(long, value_name = "FILE", default_value = "etc/tofcam.toml")]
    pub config: PathBuf,

    /// Override the serial device path from the config
    #[arg(long, value_name = "DEV")]
    pub device: Option<String>,

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
    /// Latch frames continuously and report depth statistics
    Stream {
        /// Number of frames to latch before exiting
        #[arg(long, default_value_t = 30)]
        frames: u32,
        /// Append each 16-bit frame (little-endian) to this file
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,
    },
    /// Latch a single frame and write it out
    Snapshot {
        /// Output file for the 16-bit little-endian pixels
        #[arg(long, value_name = "FILE", default_value = "frame.raw")]
        output: PathBuf,
    },
    /// Bring the pipeline up, latch a few frames, and report health
    SelfCheck,
}
