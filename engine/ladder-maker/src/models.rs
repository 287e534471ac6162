use crate::error::LadderError;
use chrono::{DateTime, Utc};
use exchange_connector::Side;
use serde::{Deserialize, Serialize};

/// Upper bound on rungs per ladder; a tiny interval would otherwise build an unbounded grid
pub const MAX_LEVELS: usize = 10_000;

/// One rung of the ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Exchange order id, empty while not resting on the book
    pub id: String,
    pub side: Side,
    /// Base-asset units
    pub quantity: f64,
    /// Quote-per-base price
    pub rate: f64,
    /// Believed executed, waiting to be re-placed
    pub filled: bool,
    /// Fair-price boundary marker; never an order
    pub is_midpoint: bool,
}

impl Level {
    /// Filled rungs other than the midpoint are the ones a tick re-submits
    pub fn awaiting_placement(&self) -> bool {
        self.filled && !self.is_midpoint
    }
}

/// Ladder construction parameters for one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub market: String,
    pub high: f64,
    pub low: f64,
    /// Reference price: picks the initial midpoint and scales the spacing
    pub start: f64,
    /// Fractional spacing, e.g. 0.01 for 1% of `start`
    pub interval: f64,
    /// Quote-currency notional per rung
    pub quantity: f64,
}

impl GridParams {
    /// Price distance between adjacent rungs
    pub fn step(&self) -> f64 {
        self.interval * self.start
    }

    pub fn validate(&self) -> Result<(), LadderError> {
        let values = [self.high, self.low, self.start, self.interval, self.quantity];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(LadderError::invalid_config(format!("{}: parameters must be finite", self.market)));
        }
        if self.market.is_empty() {
            return Err(LadderError::invalid_config("market must not be empty"));
        }
        if self.interval <= 0.0 || self.start <= 0.0 || self.quantity <= 0.0 || self.low <= 0.0 {
            return Err(LadderError::invalid_config(format!(
                "{}: interval, start, quantity and low must be positive",
                self.market
            )));
        }
        if self.high < self.low {
            return Err(LadderError::invalid_config(format!(
                "{}: high {} is below low {}",
                self.market, self.high, self.low
            )));
        }
        if self.start < self.low {
            return Err(LadderError::invalid_config(format!(
                "{}: start {} is below low {}, no rung could be the midpoint",
                self.market, self.start, self.low
            )));
        }
        let rungs = ((self.high - self.low) / self.step()).floor() + 1.0;
        if rungs > MAX_LEVELS as f64 {
            return Err(LadderError::invalid_config(format!(
                "{}: grid would have {} levels (max {})",
                self.market, rungs, MAX_LEVELS
            )));
        }
        Ok(())
    }
}

/// Base asset and quote currency of a market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub asset: String,
    pub currency: String,
}

impl TradingPair {
    pub fn new(asset: impl Into<String>, currency: impl Into<String>) -> Self {
        Self { asset: asset.into(), currency: currency.into() }
    }

    /// Derive the pair from a market id: the first three characters are the asset,
    /// the rest (minus a leading separator) the currency.
    pub fn from_market(market: &str) -> Result<Self, LadderError> {
        let mut chars = market.char_indices();
        let split = chars.nth(3).map(|(i, _)| i).ok_or_else(|| {
            LadderError::invalid_config(format!("market {market} is too short to split into asset/currency"))
        })?;
        let (asset, rest) = market.split_at(split);
        let currency = rest.trim_start_matches(['-', '_', '/']);
        if currency.is_empty() {
            return Err(LadderError::invalid_config(format!("market {market} has no currency part")));
        }
        Ok(Self::new(asset, currency))
    }
}

/// Full persisted ladder record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderState {
    pub market: String,
    pub high: f64,
    pub low: f64,
    pub start: f64,
    pub interval: f64,
    pub quantity: f64,
    /// True until the first completed tick
    pub first_run: bool,
    /// Strictly decreasing by rate
    pub levels: Vec<Level>,
}

impl LadderState {
    /// Build a fresh grid from `high` down to `low`.
    ///
    /// The first rung at or below `start` is the midpoint; rungs above it sell,
    /// rungs below it buy, and each rung is sized to `quantity / rate`.
    pub fn build(params: &GridParams) -> Result<Self, LadderError> {
        params.validate()?;

        let step = params.step();
        let tolerance = step * 1e-9;
        let mut levels = Vec::new();
        let mut midpoint_found = false;

        for k in 0.. {
            let rate = params.high - (k as f64) * step;
            if rate < params.low - tolerance {
                break;
            }

            let (side, is_midpoint) = if midpoint_found {
                (Side::Buy, false)
            } else if rate <= params.start + tolerance {
                midpoint_found = true;
                (Side::Sell, true)
            } else {
                (Side::Sell, false)
            };

            levels.push(Level {
                id: String::new(),
                side,
                quantity: params.quantity / rate,
                rate,
                filled: false,
                is_midpoint,
            });
        }

        if !midpoint_found {
            return Err(LadderError::invalid_config(format!("{}: no level at or below start", params.market)));
        }

        Ok(Self {
            market: params.market.clone(),
            high: params.high,
            low: params.low,
            start: params.start,
            interval: params.interval,
            quantity: params.quantity,
            first_run: true,
            levels,
        })
    }

    pub fn midpoint_index(&self) -> Option<usize> {
        self.levels.iter().position(|l| l.is_midpoint)
    }

    /// Currency held by buy rungs and asset held by sell rungs, midpoint excluded
    pub fn reserved_totals(&self) -> (f64, f64) {
        self.levels.iter().filter(|l| !l.is_midpoint).fold((0.0, 0.0), |(currency, asset), l| {
            match l.side {
                Side::Buy => (currency + l.quantity * l.rate, asset),
                Side::Sell => (currency, asset + l.quantity),
            }
        })
    }

    /// Currency and asset needed to re-place every rung awaiting placement
    pub fn required_for_replacement(&self) -> (f64, f64) {
        self.levels.iter().filter(|l| l.awaiting_placement()).fold((0.0, 0.0), |(currency, asset), l| {
            match l.side {
                Side::Buy => (currency + l.quantity * l.rate, asset),
                Side::Sell => (currency, asset + l.quantity),
            }
        })
    }

    pub fn pending_count(&self) -> usize {
        self.levels.iter().filter(|l| l.awaiting_placement()).count()
    }
}

/// Midpoint relocation performed by a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidpointMove {
    pub from: usize,
    pub to: usize,
}

/// Outcome of one successful tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Rungs that became filled this tick
    pub newly_filled: usize,
    pub midpoint: Option<MidpointMove>,
    pub placed: usize,
    pub placement_failures: usize,
}

/// Ladder metrics
#[derive(Debug, Clone, Default)]
pub struct LadderMetrics {
    pub ticks_ok: u64,
    pub ticks_failed: u64,
    pub fills_detected: u64,
    pub orders_placed: u64,
    pub placement_failures: u64,
    pub last_update: Option<DateTime<Utc>>,
}
