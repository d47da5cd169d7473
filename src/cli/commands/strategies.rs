//! List strategies command.

use anyhow::Result;
use trading_strategies::StrategyRegistry;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ", info.name);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        let defaults: Vec<String> = info
            .default_params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!("  Defaults: {}", defaults.join(", "));
        println!("  Tuning grid: {} candidates", info.grid.len());
        println!();
    }

    println!("Enable strategies with [strategies] enabled = [...] in the config.");

    Ok(())
}
