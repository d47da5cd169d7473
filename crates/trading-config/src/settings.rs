//! Configuration structures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_broker::PaperBrokerConfig;
use trading_core::TradingError;
use trading_engine::{EngineConfig, ExecutionConfig};
use trading_ensemble::EnsembleConfig;
use trading_risk::RiskConfig;
use trading_strategies::StrategyRegistry;
use trading_tuner::TunerConfig;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub tuner: TunerConfig,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub strategies: StrategySettings,
}

/// General app settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "ensemble-trader".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Paper broker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub initial_capital: Decimal,
    /// Slippage in percent of the last price (0.05 = 0.05%)
    pub slippage_pct: Decimal,
    pub commission_per_share: Decimal,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        let paper = PaperBrokerConfig::default();
        Self {
            initial_capital: dec!(100000),
            slippage_pct: paper.slippage_pct,
            commission_per_share: paper.commission_per_share,
        }
    }
}

impl BrokerSettings {
    pub fn paper_config(&self) -> PaperBrokerConfig {
        PaperBrokerConfig {
            slippage_pct: self.slippage_pct,
            commission_per_share: self.commission_per_share,
        }
    }
}

/// Learning state and event log location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub dir: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            dir: "state".to_string(),
        }
    }
}

/// Strategies that take part in the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub enabled: Vec<String>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            enabled: EngineConfig::default().strategies,
        }
    }
}

impl AppConfig {
    /// Engine configuration for a run starting with `broker.initial_capital`.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.broker.initial_capital,
            strategies: self.strategies.enabled.clone(),
            execution: self.execution.clone(),
            ensemble: self.ensemble.clone(),
            risk: self.risk.clone(),
            tuner: self.tuner.clone(),
        }
    }

    /// Check every section, including that enabled strategies exist.
    pub fn validate(&self) -> Result<(), TradingError> {
        let registry = StrategyRegistry::new();
        if let Some(unknown) = self
            .strategies
            .enabled
            .iter()
            .find(|name| !registry.exists(name))
        {
            return Err(TradingError::Config(format!(
                "unknown strategy '{unknown}' (available: {})",
                registry.names().join(", ")
            )));
        }
        if self.broker.slippage_pct < Decimal::ZERO
            || self.broker.commission_per_share < Decimal::ZERO
        {
            return Err(TradingError::Config(
                "broker slippage and commission must not be negative".into(),
            ));
        }
        self.engine_config().validate()
    }

    /// Render the effective configuration.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
