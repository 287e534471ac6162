//! Mock exchange for testing.
//!
//! Keeps an in-memory open-order set, balances and a ticker. Tests script fills
//! by removing ids from the open set and inject failures per operation.

use crate::error::{ExchangeError, Result};
use crate::exchange::Exchange;
use crate::types::{Side, Ticker};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A `place_order` call as the mock saw it
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub id: String,
    pub side: Side,
    pub market: String,
    pub quantity: f64,
    pub rate: f64,
}

#[derive(Debug, Default)]
struct MockState {
    open: HashSet<String>,
    balances: HashMap<String, f64>,
    ticker: Ticker,
    placed: Vec<PlacedOrder>,
    cancelled: Vec<String>,
    failing_rates: Vec<f64>,
    fail_open_orders: bool,
    fail_ticker: bool,
    fail_balance: bool,
    ticker_calls: u64,
}

/// Scriptable in-memory venue
#[derive(Debug)]
pub struct MockExchange {
    state: Mutex<MockState>,
    next_id: AtomicU64,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                ticker: Ticker { bid: 99.5, ask: 100.5, last: 100.0 },
                ..Default::default()
            }),
            next_id: AtomicU64::new(1),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    pub fn set_balance(&self, asset: impl Into<String>, amount: f64) {
        self.with_state(|s| {
            s.balances.insert(asset.into(), amount);
        });
    }

    pub fn set_ticker(&self, ticker: Ticker) {
        self.with_state(|s| s.ticker = ticker);
    }

    /// Simulate an execution: the order disappears from the open set
    pub fn fill(&self, order_id: &str) -> bool {
        self.with_state(|s| s.open.remove(order_id))
    }

    /// Make every placement at `rate` fail until cleared
    pub fn fail_placements_at(&self, rate: f64) {
        self.with_state(|s| s.failing_rates.push(rate));
    }

    pub fn clear_placement_failures(&self) {
        self.with_state(|s| s.failing_rates.clear());
    }

    pub fn fail_open_orders(&self, fail: bool) {
        self.with_state(|s| s.fail_open_orders = fail);
    }

    pub fn fail_ticker(&self, fail: bool) {
        self.with_state(|s| s.fail_ticker = fail);
    }

    pub fn fail_balance(&self, fail: bool) {
        self.with_state(|s| s.fail_balance = fail);
    }

    /// Every successful placement so far, in call order
    pub fn placed(&self) -> Vec<PlacedOrder> {
        self.with_state(|s| s.placed.clone())
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.with_state(|s| s.cancelled.clone())
    }

    pub fn ticker_calls(&self) -> u64 {
        self.with_state(|s| s.ticker_calls)
    }

    pub fn open_ids(&self) -> HashSet<String> {
        self.with_state(|s| s.open.clone())
    }

    pub fn reset_calls(&self) {
        self.with_state(|s| {
            s.placed.clear();
            s.cancelled.clear();
            s.ticker_calls = 0;
        });
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn place_order(&self, side: Side, market: &str, quantity: f64, rate: f64) -> Result<String> {
        let failing = self.with_state(|s| s.failing_rates.iter().any(|r| (r - rate).abs() < 1e-12));
        if failing {
            return Err(ExchangeError::Api { message: format!("rejected order at {rate}") });
        }

        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.with_state(|s| {
            s.open.insert(id.clone());
            s.placed.push(PlacedOrder {
                id: id.clone(),
                side,
                market: market.to_string(),
                quantity,
                rate,
            });
        });
        Ok(id)
    }

    async fn open_orders(&self, _market: &str) -> Result<HashSet<String>> {
        self.with_state(|s| {
            if s.fail_open_orders {
                Err(ExchangeError::Api { message: "open orders unavailable".to_string() })
            } else {
                Ok(s.open.clone())
            }
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.with_state(|s| {
            if s.open.remove(order_id) {
                s.cancelled.push(order_id.to_string());
                Ok(())
            } else {
                Err(ExchangeError::Api { message: format!("ORDER_NOT_OPEN {order_id}") })
            }
        })
    }

    async fn ticker(&self, _market: &str) -> Result<Ticker> {
        self.with_state(|s| {
            s.ticker_calls += 1;
            if s.fail_ticker {
                Err(ExchangeError::Api { message: "ticker unavailable".to_string() })
            } else {
                Ok(s.ticker)
            }
        })
    }

    async fn available_balance(&self, asset: &str) -> Result<f64> {
        self.with_state(|s| {
            if s.fail_balance {
                Err(ExchangeError::Api { message: "balances unavailable".to_string() })
            } else {
                Ok(s.balances.get(asset).copied().unwrap_or(0.0))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_place_fill_cancel() {
        let ex = MockExchange::new();
        let a = ex.place_order(Side::Buy, "LTCBTC", 1.0, 99.0).await.unwrap();
        let b = ex.place_order(Side::Sell, "LTCBTC", 1.0, 101.0).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(ex.open_orders("LTCBTC").await.unwrap().len(), 2);

        assert!(ex.fill(&a));
        let open = ex.open_orders("LTCBTC").await.unwrap();
        assert!(!open.contains(&a));
        assert!(open.contains(&b));

        ex.cancel_order(&b).await.unwrap();
        tokio_test::assert_err!(ex.cancel_order(&b).await);
        assert_eq!(ex.cancelled(), vec![b]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let ex = MockExchange::new();
        ex.fail_placements_at(99.0);
        assert!(ex.place_order(Side::Buy, "LTCBTC", 1.0, 99.0).await.is_err());
        assert!(ex.place_order(Side::Buy, "LTCBTC", 1.0, 98.0).await.is_ok());
        assert_eq!(ex.placed().len(), 1);

        ex.fail_open_orders(true);
        assert!(ex.open_orders("LTCBTC").await.is_err());
    }

    #[tokio::test]
    async fn test_balances_default_to_zero() {
        let ex = MockExchange::new();
        ex.set_balance("BTC", 2.0);
        assert_eq!(ex.available_balance("BTC").await.unwrap(), 2.0);
        assert_eq!(ex.available_balance("LTC").await.unwrap(), 0.0);
    }
}
