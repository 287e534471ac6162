use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Top of book for a market. `bid` is the highest buy price, `ask` the lowest
/// sell price, `last` the price of the last executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
}

impl Ticker {
    pub fn mid(&self) -> f64 {
        (self.ask + self.bid) / 2.0
    }
}

/// Accepts a JSON number or a decimal string. Some venues quote prices as strings.
pub(crate) fn f64_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

/// Same as [`f64_from_number_or_string`] but `null` reads as zero.
pub(crate) fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "f64_from_number_or_string")] f64);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0).unwrap_or(0.0))
}
