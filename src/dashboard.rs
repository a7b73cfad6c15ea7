//! Dashboard poller: keeps market data, signals and alerts fresh.
//!
//! Market and signal refreshes run concurrently and fail independently. A
//! failed refresh keeps the previous data; a failed market refresh also marks
//! the held prices stale so valuations can flag them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::SentixClient;
use crate::models::{Alert, MarketSnapshot, PriceMap, Signal};

/// Where the dashboard gets its data.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_market(&self) -> Result<MarketSnapshot>;
    async fn fetch_signals(&self) -> Result<Vec<Signal>>;
    async fn fetch_alerts(&self) -> Result<Vec<Alert>>;
}

#[async_trait]
impl MarketSource for SentixClient {
    async fn fetch_market(&self) -> Result<MarketSnapshot> {
        self.get_market().await
    }

    async fn fetch_signals(&self) -> Result<Vec<Signal>> {
        self.get_signals().await
    }

    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        self.get_alerts().await
    }
}

/// Latest known dashboard data.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub market: Option<MarketSnapshot>,
    pub prices: PriceMap,
    pub signals: Vec<Signal>,
    pub alerts: Vec<Alert>,
    /// Time of the last successful market refresh
    pub last_update: Option<DateTime<Utc>>,
}

/// Polls a [`MarketSource`] into shared state.
pub struct Dashboard<S: MarketSource> {
    source: Arc<S>,
    state: Arc<RwLock<DashboardState>>,
    updates: watch::Sender<u64>,
    shutdown: Arc<AtomicBool>,
}

/// Owns a spawned poll loop. Dropping it stops the loop.
pub struct PollerHandle {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl PollerHandle {
    /// Stop the loop now rather than at end of scope.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.halt();
    }
}

impl<S: MarketSource + 'static> Dashboard<S> {
    pub fn new(source: Arc<S>) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            source,
            state: Arc::new(RwLock::new(DashboardState::default())),
            updates,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clone of the current state.
    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    /// Receiver that ticks after every completed refresh.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// First load: market, signals and alerts together.
    pub async fn initial_load(&self) {
        info!("Loading dashboard data");
        let (_, _, alerts) = futures::join!(
            self.refresh_market(),
            self.refresh_signals(),
            self.source.fetch_alerts()
        );

        match alerts {
            Ok(alerts) => {
                debug!(count = alerts.len(), "Alerts loaded");
                self.state.write().await.alerts = alerts;
            }
            Err(e) => warn!(error = %e, "Failed to load alerts"),
        }

        self.notify();
    }

    /// Periodic refresh of market data and signals.
    pub async fn refresh(&self) {
        futures::join!(self.refresh_market(), self.refresh_signals());
        self.notify();
    }

    /// Returns whether the market refresh succeeded.
    pub async fn refresh_market(&self) -> bool {
        match self.source.fetch_market().await {
            Ok(market) => {
                let prices = market.price_map();
                debug!(assets = prices.len(), "Market data refreshed");

                let mut state = self.state.write().await;
                state.prices = prices;
                state.market = Some(market);
                state.last_update = Some(Utc::now());
                true
            }
            Err(e) => {
                warn!(error = %e, "Market refresh failed, keeping previous prices");
                self.state.write().await.prices.mark_stale();
                false
            }
        }
    }

    /// Returns whether the signal refresh succeeded.
    pub async fn refresh_signals(&self) -> bool {
        match self.source.fetch_signals().await {
            Ok(signals) => {
                debug!(count = signals.len(), "Signals refreshed");
                self.state.write().await.signals = signals;
                true
            }
            Err(e) => {
                warn!(error = %e, "Signal refresh failed, keeping previous signals");
                false
            }
        }
    }

    fn notify(&self) {
        self.updates.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Refresh every `every` until shutdown or Ctrl+C.
    pub async fn run(&self, every: Duration) {
        info!(interval_secs = every.as_secs(), "Starting dashboard poll loop");

        let mut ticker = interval(every);
        // The first tick completes immediately; initial_load covers it.
        ticker.tick().await;

        while !self.shutdown.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    self.shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.refresh().await;
        }

        info!("Dashboard poll loop stopped");
    }

    /// Run the poll loop on a background task.
    pub fn spawn(self: Arc<Self>, every: Duration) -> PollerHandle {
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            self.run(every).await;
        });
        PollerHandle { handle, shutdown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    use crate::models::{CryptoQuote, PriceStatus, SignalAction};

    #[derive(Default)]
    struct FakeSource {
        fail_market: AtomicBool,
        fail_signals: AtomicBool,
        market_calls: AtomicUsize,
        signal_calls: AtomicUsize,
        btc_price: RwLock<rust_decimal::Decimal>,
    }

    #[async_trait]
    impl MarketSource for FakeSource {
        async fn fetch_market(&self) -> Result<MarketSnapshot> {
            self.market_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_market.load(Ordering::SeqCst) {
                bail!("market down");
            }
            let mut market = MarketSnapshot::default();
            market.crypto.insert(
                "bitcoin".to_string(),
                CryptoQuote {
                    price: *self.btc_price.read().await,
                    change_24h: 1.5,
                },
            );
            Ok(market)
        }

        async fn fetch_signals(&self) -> Result<Vec<Signal>> {
            self.signal_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_signals.load(Ordering::SeqCst) {
                bail!("signals down");
            }
            Ok(vec![Signal {
                asset: "bitcoin".to_string(),
                action: SignalAction::Buy,
                confidence: 80.0,
                score: 70.0,
                reasons: "RSI oversold".to_string(),
                price: dec!(50000),
                change_24h: 1.5,
                timestamp: None,
            }])
        }

        async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
            Ok(Vec::new())
        }
    }

    fn source() -> Arc<FakeSource> {
        Arc::new(FakeSource {
            btc_price: RwLock::new(dec!(50000)),
            ..FakeSource::default()
        })
    }

    #[tokio::test]
    async fn test_initial_load_populates_state() {
        let dashboard = Dashboard::new(source());
        let rx = dashboard.subscribe();

        dashboard.initial_load().await;

        let state = dashboard.snapshot().await;
        assert!(state.market.is_some());
        assert_eq!(state.prices.lookup("bitcoin"), (dec!(50000), PriceStatus::Known));
        assert_eq!(state.signals.len(), 1);
        assert!(state.last_update.is_some());
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_failed_market_refresh_keeps_prices_and_marks_stale() {
        let src = source();
        let dashboard = Dashboard::new(src.clone());
        dashboard.initial_load().await;
        let before = dashboard.snapshot().await;

        src.fail_market.store(true, Ordering::SeqCst);
        *src.btc_price.write().await = dec!(1);
        dashboard.refresh().await;

        let after = dashboard.snapshot().await;
        assert_eq!(after.market, before.market);
        assert_eq!(after.last_update, before.last_update);
        assert!(after.prices.is_stale());
        assert_eq!(after.prices.lookup("bitcoin"), (dec!(50000), PriceStatus::Stale));
        // Signals still refreshed.
        assert_eq!(src.signal_calls.load(Ordering::SeqCst), 2);
        assert_eq!(after.signals.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_signal_refresh_keeps_market_current() {
        let src = source();
        let dashboard = Dashboard::new(src.clone());
        dashboard.initial_load().await;

        src.fail_signals.store(true, Ordering::SeqCst);
        *src.btc_price.write().await = dec!(52000);
        dashboard.refresh().await;

        let state = dashboard.snapshot().await;
        assert_eq!(state.prices.lookup("bitcoin"), (dec!(52000), PriceStatus::Known));
        assert_eq!(state.signals.len(), 1);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_polling() {
        let src = source();
        let dashboard = Arc::new(Dashboard::new(src.clone()));

        let handle = dashboard.clone().spawn(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(src.market_calls.load(Ordering::SeqCst) >= 1);

        drop(handle);
        assert!(dashboard.shutdown.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let calls = src.market_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(src.market_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_stop_halts_polling() {
        let src = source();
        let dashboard = Arc::new(Dashboard::new(src.clone()));

        let handle = dashboard.clone().spawn(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(40)).await;

        handle.stop();
        assert!(dashboard.shutdown.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let calls = src.market_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(src.market_calls.load(Ordering::SeqCst), calls);
    }
}
