//! Ladder maker configuration
//!
//! Loaded once at startup from a file (JSON, TOML or YAML by extension) layered
//! under `LADDER_`-prefixed environment variables, e.g.
//! `LADDER_LOGGING__LEVEL=debug` or `LADDER_EXCHANGE__SECRET=...`.

use crate::error::LadderError;
use crate::models::{GridParams, TradingPair};
use anyhow::{Context, Result};
use exchange_connector::VenueConfig;
use persistence::{market_key, PersistenceConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Ladder maker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderMakerConfig {
    /// Venue and credentials
    pub exchange: VenueConfig,

    /// One ladder per entry
    pub markets: Vec<MarketConfig>,

    /// Seconds between ticks of each ladder
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Where ladder state files live
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Cancel every resting order when the process stops
    #[serde(default)]
    pub cancel_on_shutdown: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Venue market identifier
    pub market: String,
    pub high: f64,
    pub low: f64,
    pub start: f64,
    /// Fractional spacing between rungs
    pub interval: f64,
    /// Quote-currency notional per rung
    pub quantity: f64,
    /// Base asset symbol, derived from `market` when absent
    #[serde(default)]
    pub asset: Option<String>,
    /// Quote currency symbol, derived from `market` when absent
    #[serde(default)]
    pub currency: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_tick_interval_secs() -> u64 {
    30
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

impl MarketConfig {
    pub fn grid(&self) -> GridParams {
        GridParams {
            market: self.market.clone(),
            high: self.high,
            low: self.low,
            start: self.start,
            interval: self.interval,
            quantity: self.quantity,
        }
    }

    /// Explicit symbols win; otherwise split the market id
    pub fn pair(&self) -> Result<TradingPair, LadderError> {
        match (&self.asset, &self.currency) {
            (Some(asset), Some(currency)) => Ok(TradingPair::new(asset.as_str(), currency.as_str())),
            (None, None) => TradingPair::from_market(&self.market),
            _ => Err(LadderError::invalid_config(format!(
                "{}: set both asset and currency, or neither",
                self.market
            ))),
        }
    }
}

impl LadderMakerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn persistence(&self) -> PersistenceConfig {
        PersistenceConfig::new(self.data_dir.clone())
    }
}

/// Load configuration from `path` and the environment, then validate it
pub fn load_config(path: &Path) -> Result<LadderMakerConfig> {
    tracing::debug!("Loading configuration from file: {:?}", path);

    let settings = ::config::Config::builder()
        .add_source(::config::File::from(path))
        .add_source(
            ::config::Environment::with_prefix("LADDER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

    let config: LadderMakerConfig =
        settings.try_deserialize().context("Failed to parse configuration")?;

    validate_config(&config)?;

    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &LadderMakerConfig) -> Result<()> {
    config.exchange.kind().context("Invalid exchange")?;

    if config.markets.is_empty() {
        return Err(anyhow::anyhow!("No markets configured"));
    }

    let mut seen = HashSet::new();
    let mut keys = HashSet::new();
    for market in &config.markets {
        if !seen.insert(market.market.as_str()) {
            return Err(anyhow::anyhow!("Duplicate market: {}", market.market));
        }
        // Markets that differ only in separators would share one state file
        if !keys.insert(market_key(&market.market)) {
            return Err(anyhow::anyhow!("Market {} collides with another market's state file", market.market));
        }
        market.grid().validate()?;
        market.pair()?;
    }

    if config.tick_interval_secs == 0 {
        return Err(anyhow::anyhow!("Invalid tick interval: {}", config.tick_interval_secs));
    }

    // Validate log level
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    // Validate log format
    match config.logging.format.as_str() {
        "json" | "pretty" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    Ok(())
}
