//! Validate configuration command.

use anyhow::Result;
use config::ConfigError;
use std::path::Path;
use trading_config::AppConfig;

pub async fn run(config_path: &Path, loaded: Result<AppConfig, ConfigError>) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Initial capital: ${}", config.broker.initial_capital);
    println!("Strategies: {}", config.strategies.enabled.join(", "));
    println!(
        "Thresholds: buy {} / sell {}",
        config.ensemble.buy_threshold, config.ensemble.sell_threshold
    );
    println!("Max risk per trade: {}", config.risk.max_risk_per_trade);
    println!(
        "Breaker: portfolio {} / drawdown {} / position {}",
        config.risk.breaker.max_portfolio_loss_pct,
        config.risk.breaker.max_intraday_loss_pct,
        config.risk.breaker.max_position_loss_pct
    );
    println!("Store: {}", config.store.dir);
    println!();
    println!("Effective configuration");
    println!("───────────────────────────────────────────────────────────");
    println!("{}", config.to_toml()?);

    Ok(())
}
