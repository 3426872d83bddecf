// =============================================================================
// Expectancy Aggregator — pure reducer over closed-trade diagnostics
// =============================================================================
//
// Grounded on `app_state.rs`'s `JournalStats` win-rate/profit-factor
// calculation over a closed-trade history, extended with the MFE/MAE/R-
// multiple/slippage-percentile/score-bucket breakdown that teacher file does
// not compute. A pure function over a trade slice, same shape as the
// indicator functions in `indicators/` — no state, no locking.

use serde::Serialize;

use crate::diagnostics::tracker::TradeDiagnostics;
use crate::regime::Regime;
use crate::types::Outcome;

const BREAKEVEN_FIXED_FEE_USD: f64 = 0.01;
const BREAKEVEN_NOMINAL_PRICE_USD: f64 = 200.0;
const MIN_TRADES_FOR_BREAKEVEN_SIZE: usize = 10;
const SCORE_BUCKET_WIDTH: f64 = 10.0;
const SCORE_BUCKET_COUNT: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBucket {
    pub range_low: f64,
    pub range_high: f64,
    pub count: usize,
    pub win_rate: f64,
    pub avg_pnl_percent: f64,
    pub avg_mfe_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlippageStats {
    pub mean_bps: f64,
    pub median_bps: f64,
    pub p90_bps: f64,
    pub worst_bps: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectancyMetrics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub avg_win_percent: f64,
    pub avg_loss_percent: f64,
    pub total_pnl_percent: f64,
    pub expectancy: f64,
    pub expectancy_after_fees: f64,
    pub avg_mfe_percent: f64,
    pub avg_mae_percent: f64,
    pub mfe_mae_ratio: Option<f64>,
    pub avg_r_multiple: Option<f64>,
    pub pct_trades_mfe_reached_two_r: f64,
    pub avg_fees_percent: f64,
    pub slippage: SlippageStats,
    pub score_buckets: Vec<ScoreBucket>,
    pub break_even_position_size_sol: Option<f64>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

fn score_bucket_index(score: f64) -> usize {
    let magnitude = score.abs().min(99.999);
    ((magnitude / SCORE_BUCKET_WIDTH) as usize).min(SCORE_BUCKET_COUNT - 1)
}

/// Pure reducer: compute every aggregate statistic spec §4.12 defines over a
/// slice of closed-trade diagnostics. Returns a mostly-zeroed record for an
/// empty slice rather than panicking or erroring — an empty history is a
/// valid, if uninteresting, starting state.
pub fn compute_expectancy(trades: &[TradeDiagnostics]) -> ExpectancyMetrics {
    let total_trades = trades.len();
    let wins: Vec<&TradeDiagnostics> = trades.iter().filter(|t| t.outcome == Outcome::Win).collect();
    let losses: Vec<&TradeDiagnostics> = trades.iter().filter(|t| t.outcome == Outcome::Loss).collect();
    let breakevens = trades.iter().filter(|t| t.outcome == Outcome::Breakeven).count();

    let win_rate = if total_trades > 0 { wins.len() as f64 / total_trades as f64 * 100.0 } else { 0.0 };
    let loss_rate = if total_trades > 0 { losses.len() as f64 / total_trades as f64 * 100.0 } else { 0.0 };

    let avg_win_percent = mean(&wins.iter().map(|t| t.execution.actual_pnl_percent).collect::<Vec<_>>());
    let avg_loss_percent = mean(&losses.iter().map(|t| t.execution.actual_pnl_percent).collect::<Vec<_>>());
    let total_pnl_percent: f64 = trades.iter().map(|t| t.execution.actual_pnl_percent).sum();

    let expectancy = (win_rate / 100.0) * avg_win_percent + (loss_rate / 100.0) * avg_loss_percent;
    let avg_fees_percent = mean(&trades.iter().map(|t| t.execution.fees_percent).collect::<Vec<_>>());
    let expectancy_after_fees = expectancy - avg_fees_percent;

    let avg_mfe_percent = mean(&trades.iter().map(|t| t.excursion.mfe_max).collect::<Vec<_>>());
    let avg_mae_percent = mean(&trades.iter().map(|t| t.excursion.mae_max.abs()).collect::<Vec<_>>());
    let mfe_mae_ratio = (avg_mae_percent > 0.0).then_some(avg_mfe_percent / avg_mae_percent);

    let r_multiples: Vec<f64> = trades.iter().filter_map(|t| t.r_multiple).collect();
    let avg_r_multiple = (!r_multiples.is_empty()).then(|| mean(&r_multiples));
    let pct_trades_mfe_reached_two_r = if total_trades > 0 {
        trades.iter().filter(|t| t.mfe_reached_two_r).count() as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    let mut slippage_bps: Vec<f64> = trades.iter().map(|t| t.execution.exit_slippage_bps).collect();
    slippage_bps.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let slippage = SlippageStats {
        mean_bps: mean(&slippage_bps),
        median_bps: percentile(&slippage_bps, 50.0),
        p90_bps: percentile(&slippage_bps, 90.0),
        worst_bps: slippage_bps.last().copied().unwrap_or(0.0),
    };

    let mut buckets: Vec<(usize, Vec<f64>, Vec<f64>)> =
        (0..SCORE_BUCKET_COUNT).map(|_| (0usize, Vec::new(), Vec::new())).collect();
    for t in trades {
        let idx = score_bucket_index(t.signal_score);
        buckets[idx].0 += 1;
        buckets[idx].1.push(t.execution.actual_pnl_percent);
        buckets[idx].2.push(t.excursion.mfe_max);
    }
    let score_buckets = buckets
        .into_iter()
        .enumerate()
        .map(|(idx, (count, pnls, mfes))| {
            let range_low = idx as f64 * SCORE_BUCKET_WIDTH;
            let wins_in_bucket = pnls.iter().filter(|&&p| p > 0.05).count();
            ScoreBucket {
                range_low,
                range_high: range_low + SCORE_BUCKET_WIDTH,
                count,
                win_rate: if count > 0 { wins_in_bucket as f64 / count as f64 * 100.0 } else { 0.0 },
                avg_pnl_percent: mean(&pnls),
                avg_mfe_percent: mean(&mfes),
            }
        })
        .collect();

    // Minimum SOL size at which expectancy covers the fixed per-trade fee at
    // a nominal reference price, given as a percent-of-position-value figure.
    let break_even_position_size_sol = (total_trades >= MIN_TRADES_FOR_BREAKEVEN_SIZE && expectancy_after_fees > 0.0)
        .then(|| {
            let fee_percent_needed = BREAKEVEN_FIXED_FEE_USD / BREAKEVEN_NOMINAL_PRICE_USD * 100.0;
            fee_percent_needed / expectancy_after_fees
        })
        .filter(|v| v.is_finite() && *v > 0.0);

    ExpectancyMetrics {
        total_trades,
        wins: wins.len(),
        losses: losses.len(),
        breakevens,
        win_rate,
        loss_rate,
        avg_win_percent,
        avg_loss_percent,
        total_pnl_percent,
        expectancy,
        expectancy_after_fees,
        avg_mfe_percent,
        avg_mae_percent,
        mfe_mae_ratio,
        avg_r_multiple,
        pct_trades_mfe_reached_two_r,
        avg_fees_percent,
        slippage,
        score_buckets,
        break_even_position_size_sol,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpectancyFilters {
    pub regime: Option<Regime>,
    pub mfe_before_mae: Option<bool>,
    pub regime_shifted: Option<bool>,
    /// Inclusive UTC hour range; wraps around midnight when `start > end`.
    pub hour_range: Option<(u8, u8)>,
}

fn hour_of_day_utc(ts_ms: i64) -> u8 {
    let seconds_in_day = 86_400i64;
    let secs = ts_ms.div_euclid(1000).rem_euclid(seconds_in_day);
    (secs / 3600) as u8
}

fn in_hour_range(ts_ms: i64, start: u8, end: u8) -> bool {
    let hour = hour_of_day_utc(ts_ms);
    if start <= end {
        hour >= start && hour <= end
    } else {
        hour >= start || hour <= end
    }
}

/// Filter a trade slice by the optional criteria in `filters`; every `Some`
/// field narrows the result, `None` fields are unconstrained.
pub fn filter_trades(trades: &[TradeDiagnostics], filters: &ExpectancyFilters) -> Vec<TradeDiagnostics> {
    trades
        .iter()
        .filter(|t| filters.regime.map_or(true, |r| t.regime_at_entry == r))
        .filter(|t| filters.mfe_before_mae.map_or(true, |want| t.excursion.mfe_before_mae == Some(want)))
        .filter(|t| filters.regime_shifted.map_or(true, |want| t.regime_shifted_after_entry == want))
        .filter(|t| filters.hour_range.map_or(true, |(s, e)| in_hour_range(t.entry_time_ms, s, e)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::tracker::{ExcursionBlock, ExecutionBlock, MfeHorizons};
    use crate::types::Direction;

    fn trade(outcome: Outcome, pnl: f64, signal_score: f64, mfe: f64, regime: Regime) -> TradeDiagnostics {
        TradeDiagnostics {
            trade_id: "t".to_string(),
            direction: Direction::Long,
            entry_price: 100.0,
            entry_time_ms: 0,
            exit_price: 100.0 + pnl,
            exit_time_ms: 60_000,
            exit_reason: crate::types::ExitReason::TakeProfit,
            size: 1.0,
            signal_score,
            signal_confidence: 70.0,
            stop_loss_percent: 1.0,
            excursion: ExcursionBlock {
                mfe_horizons: MfeHorizons::default(),
                mfe_max: mfe,
                mfe_time_ms: None,
                mae_max: -0.3,
                mae_time_ms: None,
                mfe_before_mae: Some(true),
                time_to_first_favorable_ms: None,
                first_favorable_percent: None,
                first_significant_move: None,
                price_path: Vec::new(),
            },
            execution: ExecutionBlock {
                theoretical_exit_price: 100.0 + pnl,
                actual_exit_price: 100.0 + pnl,
                exit_slippage_bps: 5.0,
                exit_slippage_usd: 0.05,
                total_fees_usd: 0.1,
                ideal_pnl_percent: pnl,
                actual_pnl_percent: pnl,
                drag_percent: 0.0,
                fees_percent: 0.1,
            },
            regime_at_entry: regime,
            regime_at_exit: regime,
            regime_shifted_after_entry: false,
            outcome,
            r_multiple: Some(pnl),
            mfe_reached_two_r: mfe >= 2.0,
        }
    }

    #[test]
    fn empty_slice_yields_zeroed_metrics() {
        let metrics = compute_expectancy(&[]);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert!(metrics.break_even_position_size_sol.is_none());
    }

    #[test]
    fn win_rate_and_expectancy_over_mixed_trades() {
        let trades = vec![
            trade(Outcome::Win, 2.0, 60.0, 3.0, Regime::TrendingBullish),
            trade(Outcome::Win, 1.0, 55.0, 2.0, Regime::TrendingBullish),
            trade(Outcome::Loss, -1.0, 40.0, 0.2, Regime::Ranging),
        ];
        let metrics = compute_expectancy(&trades);
        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.wins, 2);
        assert_eq!(metrics.losses, 1);
        assert!((metrics.win_rate - 200.0 / 3.0).abs() < 1e-6);
        assert!(metrics.expectancy > 0.0);
    }

    #[test]
    fn score_buckets_partition_by_absolute_score() {
        let trades = vec![
            trade(Outcome::Win, 1.0, 5.0, 1.0, Regime::Ranging),
            trade(Outcome::Win, 1.0, 95.0, 1.0, Regime::Ranging),
        ];
        let metrics = compute_expectancy(&trades);
        assert_eq!(metrics.score_buckets.len(), SCORE_BUCKET_COUNT);
        assert_eq!(metrics.score_buckets[0].count, 1);
        assert_eq!(metrics.score_buckets[9].count, 1);
    }

    #[test]
    fn filter_by_regime_narrows_result() {
        let trades = vec![
            trade(Outcome::Win, 1.0, 50.0, 1.0, Regime::TrendingBullish),
            trade(Outcome::Loss, -1.0, 50.0, 0.1, Regime::Ranging),
        ];
        let filters = ExpectancyFilters { regime: Some(Regime::Ranging), ..Default::default() };
        let filtered = filter_trades(&trades, &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].regime_at_entry, Regime::Ranging);
    }

    #[test]
    fn filter_by_hour_range_wraps_midnight() {
        let mut t = trade(Outcome::Win, 1.0, 50.0, 1.0, Regime::Ranging);
        t.entry_time_ms = 23 * 3600 * 1000; // 23:00 UTC
        let filters = ExpectancyFilters { hour_range: Some((22, 2)), ..Default::default() };
        let filtered = filter_trades(&[t], &filters);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn break_even_size_requires_minimum_trade_count() {
        let trades: Vec<_> = (0..5).map(|_| trade(Outcome::Win, 1.0, 50.0, 1.0, Regime::Ranging)).collect();
        let metrics = compute_expectancy(&trades);
        assert!(metrics.break_even_position_size_sol.is_none());
    }
}
