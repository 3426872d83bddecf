// =============================================================================
// Diagnostics Tracker — live MFE/MAE excursion tracking per open trade
// =============================================================================

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::regime::Regime;
use crate::types::{Direction, ExitReason, Outcome};

/// Sample log ceiling: 15 minutes at one sample per price tick that reaches
/// `update_tracker`, generously bounded at one per second.
const SAMPLE_LOG_WINDOW_MS: i64 = 15 * 60 * 1000;
/// Completed-diagnostics cache ceiling (spec §3).
const COMPLETED_CACHE_CAPACITY: usize = 500;

const SIGNIFICANT_MOVE_THRESHOLD_PCT: f64 = 0.1;

const HORIZON_1M_MS: i64 = 60_000;
const HORIZON_3M_MS: i64 = 3 * 60_000;
const HORIZON_5M_MS: i64 = 5 * 60_000;
const HORIZON_10M_MS: i64 = 10 * 60_000;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceSample {
    pub ts: i64,
    pub excursion_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePolarity {
    Favorable,
    Adverse,
}

#[derive(Debug, Clone)]
pub struct TradeOpenParams {
    pub trade_id: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time_ms: i64,
    pub size: f64,
    pub stop_loss_percent: f64,
    pub signal_score: f64,
    pub signal_confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitData {
    pub exit_price: f64,
    pub exit_time_ms: i64,
    pub exit_reason: ExitReason,
    pub theoretical_exit_price: f64,
    pub actual_exit_price: f64,
    pub exit_slippage_bps: f64,
    pub exit_slippage_usd: f64,
    pub total_fees_usd: f64,
    pub final_pnl_percent: f64,
}

struct ActiveTracker {
    params: TradeOpenParams,
    regime_at_entry: Regime,
    samples: VecDeque<PriceSample>,
    mfe: f64,
    mfe_time_ms: Option<i64>,
    mae: f64,
    mae_time_ms: Option<i64>,
    time_to_first_favorable_ms: Option<i64>,
    first_favorable_percent: Option<f64>,
    first_significant_move: Option<MovePolarity>,
}

impl ActiveTracker {
    fn new(params: TradeOpenParams, regime_at_entry: Regime) -> Self {
        Self {
            params,
            regime_at_entry,
            samples: VecDeque::new(),
            mfe: 0.0,
            mfe_time_ms: None,
            mae: 0.0,
            mae_time_ms: None,
            time_to_first_favorable_ms: None,
            first_favorable_percent: None,
            first_significant_move: None,
        }
    }

    fn excursion_percent(&self, price: f64) -> f64 {
        self.params.direction.sign() * (price - self.params.entry_price) / self.params.entry_price * 100.0
    }

    fn observe(&mut self, price: f64, now_ms: i64) {
        let excursion = self.excursion_percent(price);

        self.samples.push_back(PriceSample { ts: now_ms, excursion_percent: excursion });
        let cutoff = now_ms - SAMPLE_LOG_WINDOW_MS;
        while self.samples.front().is_some_and(|s| s.ts < cutoff) {
            self.samples.pop_front();
        }

        if excursion > self.mfe {
            self.mfe = excursion;
            self.mfe_time_ms = Some(now_ms);
        }
        if excursion < self.mae {
            self.mae = excursion;
            self.mae_time_ms = Some(now_ms);
        }

        if self.time_to_first_favorable_ms.is_none() && excursion > 0.0 {
            self.time_to_first_favorable_ms = Some(now_ms - self.params.entry_time_ms);
            self.first_favorable_percent = Some(excursion);
        }

        if self.first_significant_move.is_none() {
            if excursion >= SIGNIFICANT_MOVE_THRESHOLD_PCT {
                self.first_significant_move = Some(MovePolarity::Favorable);
            } else if excursion <= -SIGNIFICANT_MOVE_THRESHOLD_PCT {
                self.first_significant_move = Some(MovePolarity::Adverse);
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MfeHorizons {
    pub one_min: Option<f64>,
    pub three_min: Option<f64>,
    pub five_min: Option<f64>,
    pub ten_min: Option<f64>,
}

fn mfe_at_horizon(samples: &VecDeque<PriceSample>, entry_time_ms: i64, horizon_ms: i64) -> Option<f64> {
    let Some(last) = samples.back() else { return None };
    if last.ts < entry_time_ms + horizon_ms {
        return None;
    }
    samples
        .iter()
        .filter(|s| s.ts <= entry_time_ms + horizon_ms)
        .map(|s| s.excursion_percent)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

/// `true` iff the first index with excursion >= +0.1 is strictly before the
/// first index with excursion <= -0.1; `true`/`false` in the degenerate
/// single-sided cases; `None` if neither ever occurred.
fn mfe_before_mae(samples: &VecDeque<PriceSample>) -> Option<bool> {
    let first_favorable = samples.iter().position(|s| s.excursion_percent >= SIGNIFICANT_MOVE_THRESHOLD_PCT);
    let first_adverse = samples.iter().position(|s| s.excursion_percent <= -SIGNIFICANT_MOVE_THRESHOLD_PCT);
    match (first_favorable, first_adverse) {
        (Some(f), Some(a)) => Some(f < a),
        (Some(_), None) => Some(true),
        (None, Some(_)) => Some(false),
        (None, None) => None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcursionBlock {
    pub mfe_horizons: MfeHorizons,
    pub mfe_max: f64,
    pub mfe_time_ms: Option<i64>,
    pub mae_max: f64,
    pub mae_time_ms: Option<i64>,
    pub mfe_before_mae: Option<bool>,
    pub time_to_first_favorable_ms: Option<i64>,
    pub first_favorable_percent: Option<f64>,
    pub first_significant_move: Option<MovePolarity>,
    pub price_path: Vec<PriceSample>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBlock {
    pub theoretical_exit_price: f64,
    pub actual_exit_price: f64,
    pub exit_slippage_bps: f64,
    pub exit_slippage_usd: f64,
    pub total_fees_usd: f64,
    pub ideal_pnl_percent: f64,
    pub actual_pnl_percent: f64,
    pub drag_percent: f64,
    pub fees_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDiagnostics {
    pub trade_id: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time_ms: i64,
    pub exit_price: f64,
    pub exit_time_ms: i64,
    pub exit_reason: ExitReason,
    pub size: f64,
    pub signal_score: f64,
    pub signal_confidence: f64,
    pub stop_loss_percent: f64,
    pub excursion: ExcursionBlock,
    pub execution: ExecutionBlock,
    pub regime_at_entry: Regime,
    pub regime_at_exit: Regime,
    pub regime_shifted_after_entry: bool,
    pub outcome: Outcome,
    pub r_multiple: Option<f64>,
    pub mfe_reached_two_r: bool,
}

#[derive(Debug, Default)]
struct Inner {
    active: HashMap<String, ActiveTracker>,
    completed: VecDeque<TradeDiagnostics>,
}

impl std::fmt::Debug for ActiveTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveTracker")
            .field("trade_id", &self.params.trade_id)
            .field("samples", &self.samples.len())
            .finish()
    }
}

/// Process-singleton tracker for every currently open trade's MFE/MAE
/// excursion, plus the bounded completed-diagnostics cache.
#[derive(Debug, Default)]
pub struct DiagnosticsTracker {
    inner: RwLock<Inner>,
}

impl DiagnosticsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_tracking_trade(&self, params: TradeOpenParams, regime_at_entry: Regime) {
        let mut inner = self.inner.write();
        inner.active.insert(params.trade_id.clone(), ActiveTracker::new(params, regime_at_entry));
    }

    /// Called from the price-tick hook for every active tracker; all
    /// trackers observe the same tick timestamp.
    pub fn update_all(&self, price: f64, now_ms: i64) {
        let mut inner = self.inner.write();
        for tracker in inner.active.values_mut() {
            tracker.observe(price, now_ms);
        }
    }

    pub fn update_tracker(&self, trade_id: &str, price: f64, now_ms: i64) {
        let mut inner = self.inner.write();
        if let Some(tracker) = inner.active.get_mut(trade_id) {
            tracker.observe(price, now_ms);
        }
    }

    /// Finalise a trade: computes the full `TradeDiagnostics` record, stores
    /// it in the bounded completed cache, and removes the live tracker.
    /// Returns `None` (and logs) if `trade_id` has no active tracker — the
    /// caller's own trade-close bookkeeping still proceeds regardless.
    pub fn stop_tracking_trade(&self, trade_id: &str, exit: ExitData, regime_at_exit: Regime) -> Option<TradeDiagnostics> {
        let mut inner = self.inner.write();
        let Some(tracker) = inner.active.remove(trade_id) else {
            warn!(trade_id, "stop_tracking_trade: no active tracker for this id");
            return None;
        };

        let entry_time = tracker.params.entry_time_ms;
        let mfe_horizons = MfeHorizons {
            one_min: mfe_at_horizon(&tracker.samples, entry_time, HORIZON_1M_MS),
            three_min: mfe_at_horizon(&tracker.samples, entry_time, HORIZON_3M_MS),
            five_min: mfe_at_horizon(&tracker.samples, entry_time, HORIZON_5M_MS),
            ten_min: mfe_at_horizon(&tracker.samples, entry_time, HORIZON_10M_MS),
        };

        let ideal_pnl_percent = tracker.params.direction.sign()
            * (exit.theoretical_exit_price - tracker.params.entry_price)
            / tracker.params.entry_price
            * 100.0;
        let actual_pnl_percent = exit.final_pnl_percent;
        let trade_value_usd = tracker.params.entry_price * tracker.params.size;
        let fees_percent = if trade_value_usd > 0.0 { exit.total_fees_usd / trade_value_usd * 100.0 } else { 0.0 };

        let stop_loss_percent = tracker.params.stop_loss_percent;
        let r_multiple = (stop_loss_percent > 0.0).then(|| actual_pnl_percent / stop_loss_percent);
        let mfe_reached_two_r = tracker.mfe >= 2.0 * stop_loss_percent;

        let outcome = if actual_pnl_percent > 0.05 {
            Outcome::Win
        } else if actual_pnl_percent < -0.05 {
            Outcome::Loss
        } else {
            Outcome::Breakeven
        };

        let diagnostics = TradeDiagnostics {
            trade_id: tracker.params.trade_id.clone(),
            direction: tracker.params.direction,
            entry_price: tracker.params.entry_price,
            entry_time_ms: entry_time,
            exit_price: exit.exit_price,
            exit_time_ms: exit.exit_time_ms,
            exit_reason: exit.exit_reason,
            size: tracker.params.size,
            signal_score: tracker.params.signal_score,
            signal_confidence: tracker.params.signal_confidence,
            stop_loss_percent,
            excursion: ExcursionBlock {
                mfe_horizons,
                mfe_max: tracker.mfe,
                mfe_time_ms: tracker.mfe_time_ms,
                mae_max: tracker.mae,
                mae_time_ms: tracker.mae_time_ms,
                mfe_before_mae: mfe_before_mae(&tracker.samples),
                time_to_first_favorable_ms: tracker.time_to_first_favorable_ms,
                first_favorable_percent: tracker.first_favorable_percent,
                first_significant_move: tracker.first_significant_move,
                price_path: tracker.samples.into_iter().collect(),
            },
            execution: ExecutionBlock {
                theoretical_exit_price: exit.theoretical_exit_price,
                actual_exit_price: exit.actual_exit_price,
                exit_slippage_bps: exit.exit_slippage_bps,
                exit_slippage_usd: exit.exit_slippage_usd,
                total_fees_usd: exit.total_fees_usd,
                ideal_pnl_percent,
                actual_pnl_percent,
                drag_percent: ideal_pnl_percent - actual_pnl_percent,
                fees_percent,
            },
            regime_at_entry: tracker.regime_at_entry,
            regime_at_exit,
            regime_shifted_after_entry: tracker.regime_at_entry != regime_at_exit,
            outcome,
            r_multiple,
            mfe_reached_two_r,
        };

        inner.completed.push_back(diagnostics.clone());
        while inner.completed.len() > COMPLETED_CACHE_CAPACITY {
            inner.completed.pop_front();
        }

        Some(diagnostics)
    }

    pub fn completed(&self) -> Vec<TradeDiagnostics> {
        self.inner.read().completed.iter().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.read().active.len()
    }

    pub fn reset(&self) {
        *self.inner.write() = Inner::default();
    }
}
