// =============================================================================
// Aurora Spot Nexus — Main Entry Point
// =============================================================================
//
// The engine starts in Demo + Paused mode for safety. Users must explicitly
// switch to Live mode via the dashboard or API.
//
// This build trades a single SOL/USDC spot pair. Price ticks arrive from a
// `PriceFeed` collaborator (see `price_feed.rs`) and are the only input the
// `Core` ever consumes; order placement, balances and exchange connectivity
// are deliberately out of scope (spec §9 Non-goals) and live outside this
// process.
// =============================================================================

mod api;
mod candle;
mod config;
mod core;
mod cost;
mod diagnostics;
mod error;
mod indicators;
mod price_feed;
mod regime;
mod strategy;
mod types;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::RuntimeConfig;
use crate::core::Core;
use crate::price_feed::StubPriceFeed;
use crate::strategy::StrategyConfig;
use crate::types::{AccountMode, TradingMode};

const RUNTIME_CONFIG_PATH: &str = "runtime_config.json";
const STRATEGY_CONFIG_PATH: &str = "strategy_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Aurora Spot Nexus — Starting Up                  ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut runtime_config = RuntimeConfig::load_or_default(RUNTIME_CONFIG_PATH);
    let strategy_config = StrategyConfig::load_or_default(STRATEGY_CONFIG_PATH);

    // SAFETY: Force Demo + Paused on startup.
    runtime_config.trading_mode = TradingMode::Paused;
    runtime_config.account_mode = AccountMode::Demo;

    if let Ok(symbol) = std::env::var("AURORA_SYMBOL") {
        let symbol = symbol.trim().to_uppercase();
        if !symbol.is_empty() {
            runtime_config.symbol = symbol;
        }
    }
    if let Ok(bind_addr) = std::env::var("AURORA_BIND_ADDR") {
        if !bind_addr.trim().is_empty() {
            runtime_config.bind_addr = bind_addr;
        }
    }

    info!(
        symbol = %runtime_config.symbol,
        trading_mode = %runtime_config.trading_mode,
        account_mode = %runtime_config.account_mode,
        "Engine starting in SAFE mode (Demo + Paused)"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let bind_addr = runtime_config.bind_addr.clone();
    let symbol = runtime_config.symbol.clone();
    let core = Arc::new(Core::new(runtime_config, strategy_config));

    // ── 3. Spawn the price feed ──────────────────────────────────────────
    // No real exchange client is wired in here (spec §9 Non-goals); a
    // deterministic stub stands in until one is. Swap `StubPriceFeed` for a
    // real `PriceFeed` implementation to connect this core to a live market.
    let starting_price = std::env::var("AURORA_STARTING_PRICE")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(150.0);
    let feed = Arc::new(StubPriceFeed::new(symbol.clone(), starting_price));
    price_feed::spawn_with_reconnect(feed, core.clone());

    // ── 4. Start the API server ──────────────────────────────────────────
    let api_core = core.clone();
    let bind_addr_clone = bind_addr.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_core);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = core.runtime_config.read().save(RUNTIME_CONFIG_PATH) {
        tracing::error!(error = %e, "Failed to save runtime config on shutdown");
    }
    if let Err(e) = core.strategy_config.read().save(STRATEGY_CONFIG_PATH) {
        tracing::error!(error = %e, "Failed to save strategy config on shutdown");
    }

    info!("Aurora Spot Nexus shut down complete.");
    Ok(())
}
