//! Run command implementation.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use trading_broker::PaperBroker;
use trading_config::AppConfig;
use trading_data::{load_symbols, ReplayFeed};
use trading_engine::ExecutionEngine;
use trading_store::JsonlStore;

use crate::cli::RunArgs;

pub async fn run(args: RunArgs, mut config: AppConfig) -> Result<()> {
    if !args.data.is_dir() {
        bail!(
            "Data directory '{}' does not exist. Provide a directory containing <SYMBOL>.csv files (e.g. --data ./data)",
            args.data.display()
        );
    }

    if let Some(capital) = args.capital {
        config.broker.initial_capital =
            Decimal::try_from(capital).context("Invalid --capital")?;
    }
    if let Some(limit) = args.max_iterations {
        config.execution.max_iterations = Some(limit);
    }
    config.validate()?;

    let series = load_symbols(&args.data, &args.symbols)?;
    let bars: usize = series.values().map(Vec::len).sum();
    info!(symbols = ?args.symbols, bars, "Loaded market data");

    let store_dir = args
        .store
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.store.dir));
    let store = JsonlStore::open(&store_dir)
        .with_context(|| format!("Failed to open store {}", store_dir.display()))?;

    let broker =
        PaperBroker::with_config(config.broker.initial_capital, config.broker.paper_config());
    let feed = ReplayFeed::new(series);

    let mut engine = ExecutionEngine::new(
        config.engine_config(),
        Arc::new(broker),
        Box::new(feed),
        Arc::new(store),
    )?;

    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Shutdown requested, finishing the current iteration");
                shutdown.store(true, Ordering::SeqCst);
            }
            Err(err) => warn!(error = %err, "Failed to listen for ctrl-c"),
        }
    });

    let report = engine.run().await;

    match args.output.as_str() {
        "json" => println!("{}", report.to_json()?),
        _ => println!("{}", report.summary()),
    }

    if let Some(save_path) = &args.save {
        std::fs::write(save_path, report.to_json()?)?;
        info!("Report saved to {:?}", save_path);
    }
    if let Some(csv_path) = &args.equity_csv {
        std::fs::write(csv_path, report.equity_to_csv())?;
        info!("Equity curve saved to {:?}", csv_path);
    }

    Ok(())
}
