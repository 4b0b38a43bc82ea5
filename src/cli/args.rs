//! Command line argument parsing for the Xiphos CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Xiphos - exact nearest-neighbour search over vector column files
#[derive(Parser, Debug, Clone)]
#[command(name = "xiphos")]
#[command(about = "Exact nearest-neighbour search over vector column files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct XiphosArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl XiphosArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Find the k nearest vectors of a column
    Search(SearchArgs),

    /// Build a column file from JSON lines
    Write(WriteArgs),

    /// Describe a column file
    Inspect(InspectArgs),
}

/// Arguments for an exact search
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Catalog root directory
    #[arg(short, long, value_name = "DIR", env = "XIPHOS_ROOT")]
    pub root: PathBuf,

    /// Column id
    #[arg(short, long, allow_negative_numbers = true)]
    pub column: i64,

    /// Metric: euc, dot or cos
    #[arg(short, long, default_value = "euc")]
    pub metric: String,

    /// Number of neighbours
    #[arg(short, long, default_value = "10", allow_negative_numbers = true)]
    pub k: i64,

    /// Query vector as comma-separated numbers, e.g. "0.5,1,-2"
    #[arg(long, value_parser = parse_component, value_delimiter = ',', allow_hyphen_values = true)]
    pub query: Vec<f64>,

    /// Search configuration file (JSON)
    #[arg(long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Scan files in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Leave neighbour vectors out of the output
    #[arg(long)]
    pub no_vectors: bool,
}

/// Arguments for writing a column file
#[derive(Parser, Debug, Clone)]
pub struct WriteArgs {
    /// Catalog root directory
    #[arg(short, long, value_name = "DIR", env = "XIPHOS_ROOT")]
    pub root: PathBuf,

    /// Column id
    #[arg(short, long)]
    pub column: u32,

    /// File name within the column (without extension)
    #[arg(short, long)]
    pub name: String,

    /// Input file: one JSON array or {"row_id", "vector"} object per line
    #[arg(short, long, value_name = "JSONL_FILE")]
    pub input: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for inspecting a column file
#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    /// Path to the .xvec file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Parse one component of a comma-separated vector.
fn parse_component(s: &str) -> std::result::Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid vector component '{s}': {e}"))
}
