//! Venue selection and credentials

use crate::bittrex::BittrexClient;
use crate::error::{ExchangeError, Result};
use crate::exchange::Exchange;
use crate::poloniex::PoloniexClient;
use crate::vertpig::VertpigClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Supported venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    Bittrex,
    Poloniex,
    Vertpig,
}

impl FromStr for VenueKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bittrex" => Ok(Self::Bittrex),
            "poloniex" => Ok(Self::Poloniex),
            "vertpig" => Ok(Self::Vertpig),
            other => Err(ExchangeError::UnknownVenue(other.to_string())),
        }
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bittrex => "bittrex",
            Self::Poloniex => "poloniex",
            Self::Vertpig => "vertpig",
        };
        write!(f, "{name}")
    }
}

/// Per-venue configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Venue name (bittrex, poloniex, vertpig)
    pub name: String,

    pub api_key: String,

    pub secret: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

// Credentials stay out of logs
impl fmt::Debug for VenueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenueConfig")
            .field("name", &self.name)
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl VenueConfig {
    pub fn kind(&self) -> Result<VenueKind> {
        self.name.parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Build the configured venue adapter
pub fn connect(config: &VenueConfig) -> Result<Arc<dyn Exchange>> {
    let timeout = config.request_timeout();
    let exchange: Arc<dyn Exchange> = match config.kind()? {
        VenueKind::Bittrex => {
            Arc::new(BittrexClient::new(config.api_key.clone(), config.secret.clone(), timeout)?)
        }
        VenueKind::Poloniex => {
            Arc::new(PoloniexClient::new(config.api_key.clone(), config.secret.as_bytes(), timeout)?)
        }
        VenueKind::Vertpig => {
            Arc::new(VertpigClient::new(config.api_key.clone(), config.secret.clone(), timeout)?)
        }
    };
    info!("Connected exchange adapter: {}", exchange.name());
    Ok(exchange)
}
