//! Error types for the ladder engine

use exchange_connector::ExchangeError;
use persistence::PersistenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LadderError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Not enough {symbol} to place orders. Wanted: {required}, have: {available}")]
    InsufficientBalance { symbol: String, required: f64, available: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tick already in progress for {market}")]
    TickInProgress { market: String },
}

impl LadderError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
