// =============================================================================
// PriceFeed — illustrative ingestion collaborator
// =============================================================================
//
// The core only ever consumes `Core::on_price(price, ts_ms)` (spec §6); where
// those ticks come from is deliberately out of scope (spec §9 Non-goals).
// This module shows the seam: a `PriceFeed` trait any exchange client can
// implement, plus a deterministic stub used when no real feed is configured,
// wired up with the same spawn-loop-sleep-and-reconnect shape `main.rs` used
// for its Binance kline streams.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::core::Core;

/// A source of authoritative price ticks for the traded symbol.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Run until the connection drops or is cancelled, pushing every tick to
    /// `core.on_price`. Returning `Err` triggers a reconnect with backoff;
    /// returning `Ok(())` ends the feed permanently.
    async fn run(&self, core: Arc<Core>) -> anyhow::Result<()>;
}

/// Deterministic synthetic feed: a slow random walk around a configurable
/// starting price, ticking once per second. Stands in for a real exchange
/// WebSocket client until one is wired in; useful for local runs and demos.
pub struct StubPriceFeed {
    pub symbol: String,
    pub starting_price: f64,
    pub tick_interval: Duration,
}

impl StubPriceFeed {
    pub fn new(symbol: impl Into<String>, starting_price: f64) -> Self {
        Self { symbol: symbol.into(), starting_price, tick_interval: Duration::from_secs(1) }
    }
}

#[async_trait]
impl PriceFeed for StubPriceFeed {
    async fn run(&self, core: Arc<Core>) -> anyhow::Result<()> {
        info!(symbol = %self.symbol, price = self.starting_price, "stub price feed starting");
        let mut price = self.starting_price;
        let mut interval = tokio::time::interval(self.tick_interval);
        let mut rng_state: u64 = 0x9E3779B97F4A7C15;
        loop {
            interval.tick().await;

            // xorshift64* — no external RNG dependency needed for a stub walk.
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;
            let unit = (rng_state >> 11) as f64 / (1u64 << 53) as f64;
            let drift = (unit - 0.5) * price * 0.0006;
            price = (price + drift).max(0.01);

            let now_ms = chrono::Utc::now().timestamp_millis();
            core.on_price(price, now_ms);
        }
    }
}

/// Spawn `feed.run` in a loop that reconnects with a fixed backoff, mirroring
/// `main.rs`'s `run_kline_stream` retry shape.
pub fn spawn_with_reconnect(feed: Arc<dyn PriceFeed>, core: Arc<Core>) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = feed.run(core.clone()).await {
                error!(error = %e, "price feed error — reconnecting in 5s");
            } else {
                warn!("price feed ended without error — reconnecting in 5s");
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    });
}
