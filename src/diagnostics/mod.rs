// =============================================================================
// Diagnostics — live per-trade excursion tracking and aggregate expectancy
// =============================================================================
//
// Grounded on `app_state.rs`'s `JournalStats` (win-rate/profit-factor-from-
// closed-positions calculation) and `position_engine.rs`'s direction-aware
// PnL/price tracking idiom, extended with MFE/MAE horizon tracking and
// bounded sample logs that neither teacher file has — built in the same
// bounded-cache-with-eviction style as `app_state.rs`'s
// `recent_decisions`/`recent_errors` ring buffers.

pub mod expectancy;
pub mod tracker;

pub use expectancy::{compute_expectancy, filter_trades, ExpectancyFilters, ExpectancyMetrics};
pub use tracker::{DiagnosticsTracker, ExcursionBlock, ExecutionBlock, ExitData, TradeDiagnostics, TradeOpenParams};
