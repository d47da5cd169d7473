//! Configuration management.
//!
//! A TOML file is layered under `TRADING__` environment variables, so
//! `TRADING__EXECUTION__CONFIRM_BARS=3` overrides `execution.confirm_bars`.

mod settings;

pub use settings::{
    AppConfig, AppSettings, BrokerSettings, LoggingConfig, StoreSettings, StrategySettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    build(path, environment())
}

fn environment() -> Environment {
    Environment::with_prefix("TRADING")
        .separator("__")
        .try_parsing(true)
}

fn build(path: &Path, env: Environment) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(env)
        .build()?;

    config.try_deserialize()
}
