//! The exchange capability the ladder engine depends on

use crate::error::Result;
use crate::types::{Side, Ticker};
use async_trait::async_trait;
use std::collections::HashSet;

/// Generic venue order book access.
///
/// Implementations must be interchangeable: the engine never asks which venue it
/// is talking to beyond [`Exchange::name`] for log lines.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Short venue name for logging
    fn name(&self) -> &'static str;

    /// Place a post-only limit order and return its id.
    ///
    /// An order that would trade immediately must be refused with
    /// [`ExchangeError::PostOnlyRejected`](crate::ExchangeError::PostOnlyRejected).
    async fn place_order(&self, side: Side, market: &str, quantity: f64, rate: f64)
        -> Result<String>;

    /// Ids of the orders currently resting in `market`
    async fn open_orders(&self, market: &str) -> Result<HashSet<String>>;

    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    async fn ticker(&self, market: &str) -> Result<Ticker>;

    /// Funds not reserved by open orders. Unknown assets report zero.
    async fn available_balance(&self, asset: &str) -> Result<f64>;
}
