// =============================================================================
// Exit Signal Generator
// =============================================================================
//
// Grounded on `exit/triple_barrier.rs`'s `evaluate(price, time) ->
// Option<ExitReason>` idiom (a mutable-priority-chain of checks run in a
// fixed order, first hit wins) and on `position_engine.rs`'s
// `TRAILING_STOP_PCT` + running-extreme-price tracking shape. The barrier
// taxonomy itself is rewritten: the teacher's TP1/TP2/progressive-tightening
// model is replaced by spec §4.8's seven-reason priority chain
// (STOP_LOSS > TAKE_PROFIT > TRAILING_STOP > SIGNAL_REVERSAL > REGIME_CHANGE
// > TIME_STOP > VOLATILITY_SPIKE), since this crate's `ActivePosition` only
// ever carries a single SL/TP pair.

use serde::Serialize;

use crate::indicators::atr::AtrLevel;
use crate::indicators::snapshot::IndicatorSnapshot;
use crate::regime::Regime;
use crate::strategy::config::StrategyConfig;
use crate::strategy::types::ActivePosition;
use crate::types::{Direction, ExitReason, ExitUrgency};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitSignal {
    pub should_exit: bool,
    pub reason: ExitReason,
    pub urgency: ExitUrgency,
    pub current_pnl_percent: f64,
    /// Advisory trailing-stop price, computed even when no exit fires, once
    /// `maxPnLPercent` has cleared the activation threshold.
    pub trailing_stop_price: Option<f64>,
}

fn no_exit(position: &ActivePosition, price: f64, trailing_stop_price: Option<f64>) -> ExitSignal {
    ExitSignal {
        should_exit: false,
        reason: ExitReason::None,
        urgency: ExitReason::None.urgency(),
        current_pnl_percent: position.pnl_percent(price),
        trailing_stop_price,
    }
}

fn exit(position: &ActivePosition, price: f64, reason: ExitReason, trailing_stop_price: Option<f64>) -> ExitSignal {
    ExitSignal {
        should_exit: true,
        reason,
        urgency: reason.urgency(),
        current_pnl_percent: position.pnl_percent(price),
        trailing_stop_price,
    }
}

/// Trailing-stop price for the given position at `price`, or `None` if the
/// position hasn't yet cleared `trailingStopActivationPercent`.
fn trailing_stop_price(position: &ActivePosition, price: f64, config: &StrategyConfig) -> Option<f64> {
    if position.max_pnl_percent < config.trailing_stop_activation_percent {
        return None;
    }
    let distance = config.trailing_stop_distance_percent / 100.0;
    Some(match position.direction {
        Direction::Long => position.max_price_seen.max(price) * (1.0 - distance),
        Direction::Short => position.min_price_seen.min(price) * (1.0 + distance),
    })
}

/// Evaluate the seven-reason priority chain against a live position. Always
/// runs, even when the market is not currently tradable — an open position
/// needs an exit opinion regardless of whether a new one could be entered.
pub fn evaluate_exit(
    position: &ActivePosition,
    snapshot: &IndicatorSnapshot,
    regime: &Regime,
    config: &StrategyConfig,
    price: f64,
    now_ms: i64,
) -> ExitSignal {
    let trail_price = if config.enable_trailing_stop {
        trailing_stop_price(position, price, config)
    } else {
        None
    };

    // 1. STOP_LOSS (critical)
    let sl_hit = match position.direction {
        Direction::Long => price <= position.current_stop_loss,
        Direction::Short => price >= position.current_stop_loss,
    };
    if sl_hit {
        return exit(position, price, ExitReason::StopLoss, trail_price);
    }

    // 2. TAKE_PROFIT (high)
    let tp_hit = match position.direction {
        Direction::Long => price >= position.take_profit,
        Direction::Short => price <= position.take_profit,
    };
    if tp_hit {
        return exit(position, price, ExitReason::TakeProfit, trail_price);
    }

    // 3. TRAILING_STOP (high)
    if let Some(trail) = trail_price {
        let trail_hit = match position.direction {
            Direction::Long => price <= trail,
            Direction::Short => price >= trail,
        };
        if trail_hit {
            return exit(position, price, ExitReason::TrailingStop, trail_price);
        }
    }

    // 4. SIGNAL_REVERSAL (medium)
    let score = snapshot.composite.score;
    let rsi = snapshot.rsi.map(|r| r.value);
    let reversal = match position.direction {
        Direction::Long => score <= -40.0 || rsi.is_some_and(|v| v >= 85.0),
        Direction::Short => score >= 40.0 || rsi.is_some_and(|v| v <= 15.0),
    };
    if reversal {
        return exit(position, price, ExitReason::SignalReversal, trail_price);
    }

    // 5. REGIME_CHANGE (medium)
    if config.enable_regime_filter && *regime == Regime::Volatile {
        return exit(position, price, ExitReason::RegimeChange, trail_price);
    }

    // 6. TIME_STOP (low)
    if position.hold_time_seconds(now_ms) >= config.max_hold_time_seconds as i64 {
        return exit(position, price, ExitReason::TimeStop, trail_price);
    }

    // 7. VOLATILITY_SPIKE (medium) — extreme ATR while in profit.
    if snapshot.atr_level == Some(AtrLevel::Extreme) && position.pnl_percent(price) > 0.0 {
        return exit(position, price, ExitReason::VolatilitySpike, trail_price);
    }

    no_exit(position, price, trail_price)
}

/// Keep `max_price_seen`, `min_price_seen` and `max_pnl_percent` monotone as
/// new prices arrive. Idempotent given an unchanging price.
pub fn update_position_tracking(position: &mut ActivePosition, price: f64) {
    position.max_price_seen = position.max_price_seen.max(price);
    position.min_price_seen = position.min_price_seen.min(price);
    let pnl = position.pnl_percent(price);
    position.max_pnl_percent = position.max_pnl_percent.max(pnl);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Timeframe;
    use crate::indicators::composite::{calculate_composite, CompositeInputs};
    use crate::indicators::ema::Trend;

    fn flat_snapshot(price: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timeframe: Timeframe::M5,
            ts: 0,
            price,
            emas: crate::indicators::ema::EmaCollection { ema9: None, ema21: None, ema50: None, ema200: None },
            ema_cross: crate::indicators::ema::EmaCrossState {
                nine_above_twentyone: None,
                twentyone_above_fifty: None,
                fifty_above_two_hundred: None,
            },
            ema_trend: Trend::Neutral,
            rsi: None,
            macd: None,
            bollinger: None,
            atr: None,
            atr_percent: None,
            atr_level: None,
            adx: None,
            vwap: None,
            volume_pressure: None,
            volume_spike: None,
            volume_momentum: None,
            obv_trend: None,
            obv_divergence: None,
            composite: calculate_composite(&CompositeInputs {
                price,
                ema_trend: Trend::Neutral,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn long_stop_loss_exit() {
        let position = ActivePosition::open(Direction::Long, 200.0, -60_000, 1.0, 198.0, 206.0);
        let snap = flat_snapshot(197.0);
        let config = StrategyConfig::default();
        let signal = evaluate_exit(&position, &snap, &Regime::Ranging, &config, 197.0, 0);
        assert_eq!(signal.reason, ExitReason::StopLoss);
        assert_eq!(signal.urgency, ExitUrgency::Critical);
        assert!((signal.current_pnl_percent - (-1.5)).abs() < 1e-9);
    }

    #[test]
    fn long_take_profit_exit() {
        let position = ActivePosition::open(Direction::Long, 200.0, 0, 1.0, 198.0, 206.0);
        let snap = flat_snapshot(207.0);
        let config = StrategyConfig::default();
        let signal = evaluate_exit(&position, &snap, &Regime::Ranging, &config, 207.0, 1_000);
        assert_eq!(signal.reason, ExitReason::TakeProfit);
    }

    #[test]
    fn trailing_stop_fires_after_activation() {
        let mut position = ActivePosition::open(Direction::Long, 200.0, 0, 1.0, 190.0, 300.0);
        let config = StrategyConfig::default();
        update_position_tracking(&mut position, 204.0); // +2%, clears 0.8% activation
        let snap = flat_snapshot(202.0);
        // trail = 204 * (1 - 0.004) = 203.184; price 202 below it.
        let signal = evaluate_exit(&position, &snap, &Regime::Ranging, &config, 202.0, 1_000);
        assert_eq!(signal.reason, ExitReason::TrailingStop);
    }

    #[test]
    fn signal_reversal_on_extreme_contra_score() {
        let position = ActivePosition::open(Direction::Long, 200.0, 0, 1.0, 180.0, 260.0);
        let mut snap = flat_snapshot(205.0);
        snap.composite.score = -45.0;
        let config = StrategyConfig::default();
        let signal = evaluate_exit(&position, &snap, &Regime::Ranging, &config, 205.0, 1_000);
        assert_eq!(signal.reason, ExitReason::SignalReversal);
    }

    #[test]
    fn regime_change_to_volatile_triggers_exit() {
        let position = ActivePosition::open(Direction::Long, 200.0, 0, 1.0, 180.0, 260.0);
        let snap = flat_snapshot(205.0);
        let mut config = StrategyConfig::default();
        config.enable_regime_filter = true;
        let signal = evaluate_exit(&position, &snap, &Regime::Volatile, &config, 205.0, 1_000);
        assert_eq!(signal.reason, ExitReason::RegimeChange);
    }

    #[test]
    fn time_stop_after_max_hold() {
        let position = ActivePosition::open(Direction::Long, 200.0, 0, 1.0, 180.0, 260.0);
        let snap = flat_snapshot(201.0);
        let config = StrategyConfig::default();
        let signal = evaluate_exit(&position, &snap, &Regime::Ranging, &config, 201.0, 1_800_001);
        assert_eq!(signal.reason, ExitReason::TimeStop);
    }

    #[test]
    fn volatility_spike_only_fires_in_profit() {
        let position = ActivePosition::open(Direction::Long, 200.0, 0, 1.0, 180.0, 260.0);
        let mut snap = flat_snapshot(195.0);
        snap.atr_level = Some(AtrLevel::Extreme);
        let config = StrategyConfig::default();
        // Losing position: extreme ATR alone should not trigger VOLATILITY_SPIKE
        // (and price 195 is above SL 180, below entry — loss, not profit).
        let signal = evaluate_exit(&position, &snap, &Regime::Ranging, &config, 195.0, 1_000);
        assert_ne!(signal.reason, ExitReason::VolatilitySpike);

        let mut snap_profit = flat_snapshot(205.0);
        snap_profit.atr_level = Some(AtrLevel::Extreme);
        let signal2 = evaluate_exit(&position, &snap_profit, &Regime::Ranging, &config, 205.0, 1_000);
        assert_eq!(signal2.reason, ExitReason::VolatilitySpike);
    }

    #[test]
    fn no_exit_when_nothing_fires() {
        let position = ActivePosition::open(Direction::Long, 200.0, 0, 1.0, 180.0, 260.0);
        let snap = flat_snapshot(201.0);
        let config = StrategyConfig::default();
        let signal = evaluate_exit(&position, &snap, &Regime::Ranging, &config, 201.0, 1_000);
        assert!(!signal.should_exit);
        assert_eq!(signal.reason, ExitReason::None);
    }

    #[test]
    fn update_position_tracking_is_idempotent() {
        let mut position = ActivePosition::open(Direction::Long, 200.0, 0, 1.0, 190.0, 220.0);
        update_position_tracking(&mut position, 210.0);
        let snapshot_after_first = (position.max_price_seen, position.min_price_seen, position.max_pnl_percent);
        update_position_tracking(&mut position, 210.0);
        assert_eq!(snapshot_after_first, (position.max_price_seen, position.min_price_seen, position.max_pnl_percent));
    }
}
