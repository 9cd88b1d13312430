//! CLI argument parsing for pipetime

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "pipetime")]
#[command(version)]
#[command(about = "Inspect operation timing snapshots exported by pipetime", long_about = None)]
pub struct Cli {
    /// Configuration file (pipetime.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Enable debug tracing on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Per-category totals, cumulative percentage and timeline coverage
    Summary {
        /// Snapshot JSON file
        snapshot: PathBuf,
    },
    /// Completed operations in start order
    Timeline {
        /// Snapshot JSON file
        snapshot: PathBuf,
    },
    /// Completed operations grouped by category
    Breakdown {
        /// Snapshot JSON file
        snapshot: PathBuf,
    },
    /// Per-category activity grid for stacked timeline charts
    Stacked {
        /// Snapshot JSON file
        snapshot: PathBuf,

        /// Bucket width in seconds (overrides timeline.resolution_secs)
        #[arg(short, long, value_name = "SECS")]
        resolution: Option<f64>,
    },
}

impl Command {
    /// Snapshot file the command reads
    pub fn snapshot_path(&self) -> &PathBuf {
        match self {
            Command::Summary { snapshot }
            | Command::Timeline { snapshot }
            | Command::Breakdown { snapshot }
            | Command::Stacked { snapshot, .. } => snapshot,
        }
    }
}
