//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ensemble-trader")]
#[command(author, version, about = "Adaptive ensemble trading engine")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level (defaults to logging.level from the config)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay CSV bars through the engine with the paper broker
    Run(RunArgs),
    /// Show the persisted learning state and last portfolio snapshot
    Status(StatusArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Directory containing <SYMBOL>.csv files
    #[arg(short, long)]
    pub data: PathBuf,

    /// Symbols to trade (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Initial capital (overrides broker.initial_capital)
    #[arg(long)]
    pub capital: Option<f64>,

    /// Stop after this many iterations
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Store directory (overrides store.dir)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,

    /// Save the JSON report to a file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Save the equity curve as CSV
    #[arg(long)]
    pub equity_csv: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Store directory (defaults to store.dir)
    #[arg(long)]
    pub store: Option<PathBuf>,
}
