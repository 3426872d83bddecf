// =============================================================================
// Core error taxonomy
// =============================================================================
//
// The decision core never panics on bad data (spec §7): indicator/gate
// functions model "insufficient data" as `None`, not an `Err`. `CoreError`
// exists for the handful of conditions that are genuinely exceptional rather
// than routine "not enough candles yet" — an unknown trade id, a malformed
// inbound request, or a config/persistence failure at the boundary. Boot and
// I/O edges still use `anyhow::Context`, matching `config.rs`'s own pattern.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A gate or indicator needed more history than the ring currently holds.
    /// Carried as a typed error only where a caller needs to distinguish it
    /// from other failures; the hot path prefers `Option`/`bool` directly.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// `closeTrade`/`updateTracker` referenced a trade id with no active
    /// tracker. Logged and surfaced, but never blocks the caller's own
    /// position-close bookkeeping.
    #[error("unknown trade id: {0}")]
    UnknownTrade(String),

    /// Non-positive price, inconsistent candle boundaries, or any other
    /// inbound value the aggregator declines to act on.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Config or ledger persistence failed. The core stays live on in-memory
    /// state; this only matters to the caller that attempted the write.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
