//! Ladder driver
//!
//! Every configured market gets its own task ticking on a fixed interval. Ticks
//! run inside that task, so shutdown is only observed between ticks and a tick
//! always finishes and saves before its task exits.

use crate::book::Ladder;
use crate::config::LadderMakerConfig;
use crate::error::LadderError;
use crate::models::TickReport;
use anyhow::{Context, Result};
use exchange_connector::{connect, Exchange};
use futures::future::join_all;
use persistence::{LocalPersistence, PersistenceBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// A ladder behind its reentrancy guard
#[derive(Clone)]
pub struct LadderHandle {
    market: String,
    ladder: Arc<Mutex<Ladder>>,
}

impl LadderHandle {
    pub fn new(ladder: Ladder) -> Self {
        Self { market: ladder.market().to_string(), ladder: Arc::new(Mutex::new(ladder)) }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn ladder(&self) -> &Arc<Mutex<Ladder>> {
        &self.ladder
    }
}

/// Tick the ladder unless another tick already holds it
pub async fn tick_guarded(handle: &LadderHandle) -> Result<TickReport, LadderError> {
    let mut ladder = handle
        .ladder
        .try_lock()
        .map_err(|_| LadderError::TickInProgress { market: handle.market.clone() })?;
    ladder.tick().await
}

fn log_outcome(market: &str, outcome: &Result<TickReport, LadderError>) {
    match outcome {
        Ok(report) => {
            let moved = report
                .midpoint
                .map(|m| format!(", midpoint {} -> {}", m.from, m.to))
                .unwrap_or_default();
            info!(
                "{}: tick complete, {} filled, {} placed, {} failed{}",
                market, report.newly_filled, report.placed, report.placement_failures, moved
            );
        }
        Err(LadderError::TickInProgress { .. }) => {
            warn!("{}: previous tick still running, skipping this one", market);
        }
        Err(e) => error!("{}: tick failed: {}", market, e),
    }
}

async fn run_ladder(handle: LadderHandle, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = interval.tick() => {
                let outcome = tick_guarded(&handle).await;
                log_outcome(handle.market(), &outcome);
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("{}: ladder stopped", handle.market);
}

/// Ladder maker service
pub struct LadderService {
    config: LadderMakerConfig,
    ladders: Vec<LadderHandle>,
}

impl LadderService {
    /// Connect to the configured venue and open every ladder from the local store
    pub async fn new(config: LadderMakerConfig) -> Result<Self> {
        let exchange = connect(&config.exchange).context("Failed to create exchange client")?;

        let mut store =
            LocalPersistence::new(config.persistence()).context("Failed to create state store")?;
        store.initialize().await.context("Failed to initialize state store")?;

        Self::with_components(config, exchange, Arc::new(store)).await
    }

    pub async fn with_components(
        config: LadderMakerConfig,
        exchange: Arc<dyn Exchange>,
        store: Arc<dyn PersistenceBackend>,
    ) -> Result<Self> {
        info!("Ladder state stored under {:?}", store.data_dir());
        let mut ladders = Vec::with_capacity(config.markets.len());

        for market in &config.markets {
            let pair = market.pair()?;
            let ladder = Ladder::open(market.grid(), pair, exchange.clone(), store.clone())
                .await
                .with_context(|| format!("Failed to open ladder for {}", market.market))?;
            ladders.push(LadderHandle::new(ladder));
        }

        Ok(Self { config, ladders })
    }

    pub fn ladders(&self) -> &[LadderHandle] {
        &self.ladders
    }

    /// Tick every ladder once, concurrently
    pub async fn run_once(&self) -> Vec<Result<TickReport, LadderError>> {
        let outcomes = join_all(self.ladders.iter().map(tick_guarded)).await;
        for (handle, outcome) in self.ladders.iter().zip(&outcomes) {
            log_outcome(handle.market(), outcome);
        }
        outcomes
    }

    /// Drive every ladder until `shutdown` turns true
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let period = self.config.tick_interval();
        info!("Starting {} ladders, ticking every {:?}", self.ladders.len(), period);

        let tasks: Vec<_> = self
            .ladders
            .iter()
            .map(|handle| tokio::spawn(run_ladder(handle.clone(), period, shutdown.clone())))
            .collect();

        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!("Ladder task failed: {}", e);
            }
        }

        if self.config.cancel_on_shutdown {
            self.cancel_all().await;
        }

        info!("All ladders stopped");
        Ok(())
    }

    /// Pull every resting order off the venue
    pub async fn cancel_all(&self) {
        for handle in &self.ladders {
            let mut ladder = handle.ladder.lock().await;
            if let Err(e) = ladder.cancel_all().await {
                error!("{}: cancel on shutdown failed: {}", handle.market, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange_connector::MockExchange;
    use persistence::InMemoryPersistence;

    fn config(cancel_on_shutdown: bool) -> LadderMakerConfig {
        let mut config: LadderMakerConfig = serde_json::from_value(serde_json::json!({
            "exchange": { "name": "bittrex", "api_key": "key", "secret": "secret" },
            "markets": [
                { "market": "LTCBTC", "high": 104, "low": 96, "start": 100, "interval": 0.01, "quantity": 10 },
                { "market": "VTC-BTC", "high": 52, "low": 48, "start": 50, "interval": 0.02, "quantity": 5 }
            ]
        }))
        .unwrap();
        config.cancel_on_shutdown = cancel_on_shutdown;
        config
    }

    fn funded_exchange() -> Arc<MockExchange> {
        let exchange = Arc::new(MockExchange::new());
        exchange.set_balance("LTC", 100.0);
        exchange.set_balance("VTC", 100.0);
        exchange.set_balance("BTC", 1_000.0);
        exchange
    }

    async fn service(exchange: &Arc<MockExchange>, cancel_on_shutdown: bool) -> LadderService {
        let store = Arc::new(InMemoryPersistence::with_default_config());
        LadderService::with_components(config(cancel_on_shutdown), exchange.clone(), store)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_once_ticks_every_ladder() {
        let exchange = funded_exchange();
        let service = service(&exchange, false).await;

        let outcomes = service.run_once().await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_ok()));
        let placed = exchange.placed();
        // 9 rungs on LTCBTC and 5 on VTC-BTC, minus one midpoint each
        assert_eq!(placed.iter().filter(|o| o.market == "LTCBTC").count(), 8);
        assert_eq!(placed.iter().filter(|o| o.market == "VTC-BTC").count(), 4);
    }

    #[tokio::test]
    async fn test_tick_skipped_while_ladder_busy() {
        let exchange = funded_exchange();
        let service = service(&exchange, false).await;
        let handle = &service.ladders()[0];

        let busy = handle.ladder().lock().await;
        let outcome = tick_guarded(handle).await;
        drop(busy);

        match outcome {
            Err(LadderError::TickInProgress { market }) => assert_eq!(market, "LTCBTC"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(exchange.placed().is_empty());
        assert!(tick_guarded(handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_one_failing_ladder_does_not_stop_others() {
        let exchange = Arc::new(MockExchange::new());
        exchange.set_balance("LTC", 100.0);
        exchange.set_balance("BTC", 1_000.0);
        let service = service(&exchange, false).await;

        let outcomes = service.run_once().await;

        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(LadderError::InsufficientBalance { .. })));
    }

    #[tokio::test]
    async fn test_run_until_shutdown_then_cancel() {
        let exchange = funded_exchange();
        let service = Arc::new(service(&exchange, true).await);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = {
            let service = service.clone();
            tokio::spawn(async move { service.run(shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        runner.await.unwrap().unwrap();

        assert_eq!(exchange.placed().len(), 12);
        assert_eq!(exchange.cancelled().len(), 12);
        assert!(exchange.open_ids().is_empty());
        for handle in service.ladders() {
            let ladder = handle.ladder().lock().await;
            assert_eq!(ladder.state().pending_count(), ladder.state().levels.len() - 1);
        }
    }

    #[tokio::test]
    async fn test_immediate_shutdown_leaves_no_orders_behind() {
        // Shutdown may land before or after the first tick; either way every order
        // placed must have been cancelled by the time run returns.
        for _ in 0..20 {
            let exchange = funded_exchange();
            let service = Arc::new(service(&exchange, true).await);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            let runner = {
                let service = service.clone();
                tokio::spawn(async move { service.run(shutdown_rx).await })
            };
            tokio::task::yield_now().await;
            shutdown_tx.send(true).unwrap();
            runner.await.unwrap().unwrap();

            assert!(exchange.open_ids().is_empty());
            assert_eq!(exchange.placed().len(), exchange.cancelled().len());
            for handle in service.ladders() {
                let ladder = handle.ladder().lock().await;
                assert!(ladder.state().levels.iter().all(|l| l.is_midpoint || l.id.is_empty()));
            }
        }
    }
}
