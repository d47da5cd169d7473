//! Error types for the trading system.
//!
//! Every category degrades to "no action" for the affected symbol or strategy;
//! none of them is meant to stop the execution loop.

use thiserror::Error;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Strategy-specific errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),
}

/// Risk engine errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },
}

/// Broker-side errors that are not order rejections.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Broker error: {0}")]
    Internal(String),
}

/// Market data errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Data source error: {0}")]
    Internal(String),
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;
