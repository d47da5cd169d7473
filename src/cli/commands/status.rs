//! Status command implementation.

use anyhow::{Context, Result};
use std::path::PathBuf;
use trading_config::AppConfig;
use trading_core::{EventKind, LearningStore};
use trading_store::JsonlStore;

use crate::cli::StatusArgs;

pub async fn run(args: StatusArgs, config: &AppConfig) -> Result<()> {
    let dir = args
        .store
        .unwrap_or_else(|| PathBuf::from(&config.store.dir));
    if !dir.is_dir() {
        anyhow::bail!("Store directory '{}' does not exist", dir.display());
    }
    let store = JsonlStore::open(&dir)
        .with_context(|| format!("Failed to open store {}", dir.display()))?;

    println!("Store: {}", dir.display());
    println!("═══════════════════════════════════════════════════════════");

    match store.latest_learning_state()? {
        Some(state) => {
            println!("Learning state at {}", state.timestamp.format("%Y-%m-%d %H:%M"));
            println!("  Updates:      {}", state.update_count);
            println!(
                "  Tuned week:   {}",
                state.tuned_week().unwrap_or("never")
            );
            let total: f64 = state.weights.values().sum();
            println!();
            println!("  Weights");
            for (name, weight) in &state.weights {
                let share = if total > 0.0 { weight / total } else { 0.0 };
                println!("    {:<16} {:>10.4}  ({:>5.1}%)", name, weight, share * 100.0);
            }
            if !state.params.is_empty() {
                println!();
                println!("  Parameters");
                for (name, params) in &state.params {
                    let rendered: Vec<String> =
                        params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    println!("    {:<16} {}", name, rendered.join(", "));
                }
            }
        }
        None => println!("No learning state recorded yet."),
    }

    let events = store.read_events()?;
    let snapshot = events.iter().rev().find_map(|event| match &event.kind {
        EventKind::Snapshot {
            cash,
            equity,
            positions,
        } => Some((event, cash, equity, positions)),
        _ => None,
    });

    println!();
    match snapshot {
        Some((event, cash, equity, positions)) => {
            println!(
                "Last snapshot (iteration {}, {})",
                event.iteration,
                event.timestamp.format("%Y-%m-%d %H:%M")
            );
            println!("  Cash:         ${:.2}", cash);
            println!("  Equity:       ${:.2}", equity);
            if positions.is_empty() {
                println!("  Positions:    none");
            } else {
                for (symbol, quantity) in positions {
                    println!("    {:<8} {}", symbol, quantity);
                }
            }
        }
        None => println!("No portfolio snapshot recorded yet."),
    }

    let breaker_trips = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::CircuitBreaker { .. }))
        .count();
    println!("  Events:       {} ({} breaker trips)", events.len(), breaker_trips);

    Ok(())
}
