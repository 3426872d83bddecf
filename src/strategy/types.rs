// =============================================================================
// ActivePosition — the position the exit signal generator reasons about
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::Direction;

/// A live position as loaned to the core for exit evaluation. Owned by the
/// order lifecycle outside this crate; the core only ever borrows one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePosition {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time_ms: i64,
    pub size: f64,
    pub initial_stop_loss: f64,
    pub current_stop_loss: f64,
    pub take_profit: f64,
    pub max_price_seen: f64,
    pub min_price_seen: f64,
    pub max_pnl_percent: f64,
}

impl ActivePosition {
    pub fn open(
        direction: Direction,
        entry_price: f64,
        entry_time_ms: i64,
        size: f64,
        initial_stop_loss: f64,
        take_profit: f64,
    ) -> Self {
        Self {
            direction,
            entry_price,
            entry_time_ms,
            size,
            initial_stop_loss,
            current_stop_loss: initial_stop_loss,
            take_profit,
            max_price_seen: entry_price,
            min_price_seen: entry_price,
            max_pnl_percent: 0.0,
        }
    }

    /// Signed PnL% at `price`, positive when the position is favourable.
    pub fn pnl_percent(&self, price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        self.direction.sign() * (price - self.entry_price) / self.entry_price * 100.0
    }

    pub fn hold_time_seconds(&self, now_ms: i64) -> i64 {
        ((now_ms - self.entry_time_ms).max(0)) / 1000
    }

    pub fn stop_loss_percent(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (self.entry_price - self.initial_stop_loss).abs() / self.entry_price * 100.0
    }
}
