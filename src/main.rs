//! Adaptive ensemble trading engine CLI.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use trading_config::load_config;
use trading_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config may be broken; validate-config reports that itself.
    let config = load_config(&cli.config);

    let (level, json) = match &config {
        Ok(config) => (
            cli.log_level
                .map(|l| l.as_str().to_string())
                .unwrap_or_else(|| config.logging.level.clone()),
            cli.json_logs || config.logging.is_json(),
        ),
        Err(_) => (
            cli.log_level.map_or("info", |l| l.as_str()).to_string(),
            cli.json_logs,
        ),
    };
    setup_logging(&level, json);

    match cli.command {
        Commands::Strategies => cli::commands::strategies::run().await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config, config).await,
        Commands::Run(args) => {
            let config = config
                .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
            cli::commands::run::run(args, config).await
        }
        Commands::Status(args) => {
            let config = config
                .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
            cli::commands::status::run(args, &config).await
        }
    }
}
