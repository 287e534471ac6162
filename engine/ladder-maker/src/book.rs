//! The ladder engine.
//!
//! A [`Ladder`] owns one market's grid, the venue it trades on and the store its
//! state is saved to. Each [`Ladder::tick`] reconciles the grid against the
//! venue's open orders, moves the midpoint after fills, re-places executed rungs
//! and saves the result whether or not the reconciliation succeeded.

use crate::error::LadderError;
use crate::models::{GridParams, LadderMetrics, LadderState, MidpointMove, TickReport, TradingPair};
use chrono::Utc;
use exchange_connector::{Exchange, Side};
use persistence::{load_typed, market_key, save_typed, PersistenceBackend};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl LadderState {
    /// Indices of non-midpoint rungs whose order is no longer open and that were
    /// not already waiting for placement
    pub fn detect_fills(&self, open: &HashSet<String>) -> Vec<usize> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.is_midpoint && !l.filled && !open.contains(&l.id))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn mark_filled(&mut self, indices: &[usize]) {
        for &i in indices {
            if let Some(level) = self.levels.get_mut(i) {
                level.filled = true;
                level.id.clear();
            }
        }
    }

    /// Move the midpoint to the first rung that is filled and either sits above
    /// the old midpoint or has an unfilled rung directly below it.
    pub fn relocate_midpoint(&mut self) -> MidpointMove {
        let orig = match self.midpoint_index() {
            Some(i) => i,
            None => {
                warn!("{}: ladder has no midpoint, scanning from the top", self.market);
                0
            }
        };
        if let Some(level) = self.levels.get_mut(orig) {
            level.is_midpoint = false;
        }

        let target = (0..self.levels.len())
            .find(|&i| {
                let level = &self.levels[i];
                level.filled
                    && (i < orig || self.levels.get(i + 1).is_some_and(|below| !below.filled))
            })
            .unwrap_or(orig);

        if let Some(level) = self.levels.get_mut(target) {
            level.is_midpoint = true;
        }

        MidpointMove { from: orig, to: target }
    }

    /// Filled rungs at or above the midpoint sell, the ones below it buy
    pub fn reassign_sides(&mut self) {
        let Some(mid) = self.midpoint_index() else {
            return;
        };
        for (i, level) in self.levels.iter_mut().enumerate() {
            if level.awaiting_placement() {
                level.side = if i <= mid { Side::Sell } else { Side::Buy };
            }
        }
    }
}

/// One market's ladder bound to a venue and a store
pub struct Ladder {
    state: LadderState,
    pair: TradingPair,
    key: String,
    exchange: Arc<dyn Exchange>,
    store: Arc<dyn PersistenceBackend>,
    metrics: LadderMetrics,
}

impl Ladder {
    /// Resume the saved ladder for `params.market`, or build a fresh one.
    ///
    /// A saved record that cannot be read is logged and replaced by a fresh grid.
    pub async fn open(
        params: GridParams,
        pair: TradingPair,
        exchange: Arc<dyn Exchange>,
        store: Arc<dyn PersistenceBackend>,
    ) -> Result<Self, LadderError> {
        params.validate()?;
        let key = market_key(&params.market);

        let state = match load_typed::<LadderState, _>(store.as_ref(), &key).await {
            Ok(Some(state)) => {
                info!("{}: resuming saved ladder ({} levels)", params.market, state.levels.len());
                state
            }
            Ok(None) => {
                debug!("{}: no saved ladder, building a new one", params.market);
                LadderState::build(&params)?
            }
            Err(e) => {
                warn!("{}: discarding unreadable saved ladder: {}", params.market, e);
                LadderState::build(&params)?
            }
        };

        Ok(Self::from_state(state, pair, exchange, store))
    }

    /// Bind an existing state without touching the store
    pub fn from_state(
        state: LadderState,
        pair: TradingPair,
        exchange: Arc<dyn Exchange>,
        store: Arc<dyn PersistenceBackend>,
    ) -> Self {
        let key = market_key(&state.market);
        let (currency, asset) = state.reserved_totals();
        info!(
            "Market: {}, Currency: {:.8} {}, Asset: {:.8} {}, # levels: {}, venue: {}",
            state.market,
            currency,
            pair.currency,
            asset,
            pair.asset,
            state.levels.len(),
            exchange.name()
        );

        Self { state, pair, key, exchange, store, metrics: LadderMetrics::default() }
    }

    pub fn market(&self) -> &str {
        &self.state.market
    }

    pub fn state(&self) -> &LadderState {
        &self.state
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    pub fn metrics(&self) -> &LadderMetrics {
        &self.metrics
    }

    /// Run one reconciliation cycle and save the state afterwards.
    ///
    /// The save happens on every exit path. If the cycle succeeded but the save
    /// failed, the save error is returned.
    pub async fn tick(&mut self) -> Result<TickReport, LadderError> {
        let outcome = self.reconcile().await;

        match &outcome {
            Ok(report) => {
                self.state.first_run = false;
                self.metrics.ticks_ok += 1;
                self.metrics.fills_detected += report.newly_filled as u64;
                self.metrics.orders_placed += report.placed as u64;
                self.metrics.placement_failures += report.placement_failures as u64;
            }
            Err(_) => self.metrics.ticks_failed += 1,
        }
        self.metrics.last_update = Some(Utc::now());

        let saved = self.persist().await;
        match (outcome, saved) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(save_err)) => Err(save_err),
            (Err(e), _) => Err(e),
        }
    }

    async fn reconcile(&mut self) -> Result<TickReport, LadderError> {
        let mut report = TickReport::default();

        let open = self.exchange.open_orders(&self.state.market).await?;
        let fills = self.state.detect_fills(&open);
        report.newly_filled = fills.len();

        if !fills.is_empty() && !self.state.first_run {
            // Fills are recorded only once the ticker answers. A rung already marked
            // filled no longer counts as new, so marking first and then failing the
            // fetch would skip its midpoint move on the next cycle.
            let ticker = self.exchange.ticker(&self.state.market).await?;
            info!("{}: current price {:.8}", self.state.market, ticker.mid());

            self.state.mark_filled(&fills);
            let moved = self.state.relocate_midpoint();
            info!("{}: midpoint {} -> {}", self.state.market, moved.from, moved.to);
            if moved.from != moved.to {
                report.midpoint = Some(moved);
            }
            self.state.reassign_sides();
        } else {
            self.state.mark_filled(&fills);
        }

        self.check_balances().await?;

        let (placed, failed) = self.place_replacements().await;
        report.placed = placed;
        report.placement_failures = failed;

        Ok(report)
    }

    /// Fail before any placement when the venue can't cover the rungs waiting to be re-placed
    async fn check_balances(&self) -> Result<(), LadderError> {
        let (required_currency, required_asset) = self.state.required_for_replacement();

        let asset_balance = self.exchange.available_balance(&self.pair.asset).await?;
        if asset_balance < required_asset {
            return Err(LadderError::InsufficientBalance {
                symbol: self.pair.asset.clone(),
                required: required_asset,
                available: asset_balance,
            });
        }

        let currency_balance = self.exchange.available_balance(&self.pair.currency).await?;
        if currency_balance < required_currency {
            return Err(LadderError::InsufficientBalance {
                symbol: self.pair.currency.clone(),
                required: required_currency,
                available: currency_balance,
            });
        }

        Ok(())
    }

    /// Returns (placed, failed). A failed rung stays filled with an empty id.
    async fn place_replacements(&mut self) -> (usize, usize) {
        let mut placed = 0;
        let mut failed = 0;

        for i in 0..self.state.levels.len() {
            let level = &self.state.levels[i];
            if !level.awaiting_placement() {
                continue;
            }
            let (side, quantity, rate) = (level.side, level.quantity, level.rate);

            match self.exchange.place_order(side, &self.state.market, quantity, rate).await {
                Ok(id) => {
                    info!("{}: placed {} {:.8} @ {:.8} ({})", self.state.market, side, quantity, rate, id);
                    let level = &mut self.state.levels[i];
                    level.id = id;
                    level.filled = false;
                    placed += 1;
                }
                Err(e) if e.is_post_only_rejection() => {
                    warn!("{}: {} @ {:.8} would have crossed the book: {}", self.state.market, side, rate, e);
                    failed += 1;
                }
                Err(e) => {
                    warn!("{}: failed to place {} @ {:.8}: {}", self.state.market, side, rate, e);
                    failed += 1;
                }
            }
        }

        (placed, failed)
    }

    /// Save the current state under this market's key
    pub async fn persist(&self) -> Result<(), LadderError> {
        save_typed(self.store.as_ref(), &self.key, &self.state).await.map_err(|e| {
            error!("{}: failed to save ladder: {}", self.state.market, e);
            LadderError::from(e)
        })
    }

    /// Cancel every live rung and mark it for re-placement on the next start.
    ///
    /// Returns the number of orders cancelled. Cancels that fail leave their rung as it was.
    pub async fn cancel_all(&mut self) -> Result<usize, LadderError> {
        let mut cancelled = 0;

        for i in 0..self.state.levels.len() {
            let level = &self.state.levels[i];
            if level.is_midpoint || level.id.is_empty() {
                continue;
            }
            let id = level.id.clone();

            match self.exchange.cancel_order(&id).await {
                Ok(()) => {
                    let level = &mut self.state.levels[i];
                    level.id.clear();
                    level.filled = true;
                    cancelled += 1;
                }
                Err(e) => warn!("{}: failed to cancel {}: {}", self.state.market, id, e),
            }
        }

        info!("{}: cancelled {} orders", self.state.market, cancelled);
        self.persist().await?;
        Ok(cancelled)
    }
}
