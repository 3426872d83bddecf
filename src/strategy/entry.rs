// =============================================================================
// Entry Signal Generator
// =============================================================================

use serde::Serialize;

use crate::indicators::adx::AdxStrength;
use crate::indicators::atr::AtrLevel;
use crate::indicators::ema::Trend;
use crate::indicators::obv::ObvDivergence;
use crate::indicators::snapshot::IndicatorSnapshot;
use crate::indicators::volume::{PressureDirection, VolumePressure};
use crate::regime::{regime_params, Regime, RegimeState};
use crate::strategy::config::StrategyConfig;
use crate::types::{Direction, TradeDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    RsiAligned,
    MacdCrossoverAligned,
    EmaTrendAligned,
    AdxStrong,
    BollingerZoneAligned,
    VolumeDominanceAligned,
    MultiTimeframeConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryWarning {
    ContraTrendEma,
    WeakAdxNotRanging,
    ContraDominanceVolume,
    RsiExhaustedVsDirection,
    MultiTimeframeDisagreement,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySignal {
    pub direction: TradeDirection,
    pub should_enter: bool,
    pub score: f64,
    pub confidence: f64,
    pub reasons: Vec<EntryReason>,
    pub warnings: Vec<EntryWarning>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub size_multiplier: f64,
}

const STOP_LOSS_FLOOR_PCT: f64 = 0.5;
const TAKE_PROFIT_FLOOR_PCT: f64 = 1.2;
const DEFAULT_ATR_PCT: f64 = 0.5;

fn regime_favourable(regime: Regime, allow_ranging: bool) -> bool {
    match regime {
        Regime::TrendingBullish | Regime::TrendingBearish => true,
        Regime::Ranging => allow_ranging,
        Regime::Volatile | Regime::Unknown => false,
    }
}

fn size_multiplier_for_confidence(confidence: f64) -> f64 {
    if confidence >= 75.0 {
        1.2
    } else if confidence >= 60.0 {
        1.0
    } else if confidence >= 45.0 {
        0.8
    } else {
        0.5
    }
}

/// Build an entry signal from a single timeframe's snapshot, the confirmed
/// regime and the caller's `StrategyConfig`. Never returns `None` — a
/// disqualified entry is represented as `direction = NONE`, not an absent
/// value, so the pipeline can always surface the reasons/warnings that led
/// there.
pub fn generate_entry_signal(
    snapshot: &IndicatorSnapshot,
    regime: &RegimeState,
    price: f64,
    config: &StrategyConfig,
) -> EntrySignal {
    if config.enable_regime_filter && !regime_favourable(regime.confirmed, config.allow_trading_in_ranging) {
        return EntrySignal {
            direction: TradeDirection::None,
            should_enter: false,
            score: snapshot.composite.score,
            confidence: snapshot.composite.confidence,
            reasons: Vec::new(),
            warnings: Vec::new(),
            stop_loss: None,
            take_profit: None,
            size_multiplier: 0.0,
        };
    }

    let score = snapshot.composite.score;
    let mut direction = if score >= config.min_score_to_enter {
        TradeDirection::Long
    } else if score <= -config.min_score_to_enter {
        TradeDirection::Short
    } else {
        TradeDirection::None
    };

    let mut reasons = Vec::new();
    let mut warnings = Vec::new();

    if direction != TradeDirection::None {
        let wants_long = direction == TradeDirection::Long;

        if let Some(rsi) = snapshot.rsi {
            use crate::indicators::snapshot::RsiZone;
            match rsi.zone {
                RsiZone::Oversold if wants_long => reasons.push(EntryReason::RsiAligned),
                RsiZone::Overbought if !wants_long => reasons.push(EntryReason::RsiAligned),
                _ => {}
            }
            if (wants_long && rsi.value > 80.0) || (!wants_long && rsi.value < 20.0) {
                warnings.push(EntryWarning::RsiExhaustedVsDirection);
            }
        }

        if let Some(macd) = snapshot.macd {
            use crate::indicators::macd::MacdCrossover;
            match macd.crossover {
                MacdCrossover::Bullish if wants_long => reasons.push(EntryReason::MacdCrossoverAligned),
                MacdCrossover::Bearish if !wants_long => reasons.push(EntryReason::MacdCrossoverAligned),
                _ => {}
            }
        }

        let ema_bullish = matches!(snapshot.ema_trend, Trend::Bullish | Trend::StrongBullish);
        let ema_bearish = matches!(snapshot.ema_trend, Trend::Bearish | Trend::StrongBearish);
        if (wants_long && ema_bullish) || (!wants_long && ema_bearish) {
            reasons.push(EntryReason::EmaTrendAligned);
        }
        if (wants_long && ema_bearish) || (!wants_long && ema_bullish) {
            warnings.push(EntryWarning::ContraTrendEma);
        }

        if let Some(adx) = snapshot.adx {
            if matches!(adx.strength, AdxStrength::Strong | AdxStrength::Extreme) {
                reasons.push(EntryReason::AdxStrong);
            }
            if matches!(adx.strength, AdxStrength::None | AdxStrength::Weak) && regime.confirmed != Regime::Ranging {
                warnings.push(EntryWarning::WeakAdxNotRanging);
            }
        }

        if let Some(bb) = snapshot.bollinger {
            if (wants_long && bb.percent_b <= 0.2) || (!wants_long && bb.percent_b >= 0.8) {
                reasons.push(EntryReason::BollingerZoneAligned);
            }
        }

        if let Some(pressure) = snapshot.volume_pressure {
            match pressure.direction {
                PressureDirection::Buying if wants_long => reasons.push(EntryReason::VolumeDominanceAligned),
                PressureDirection::Selling if !wants_long => reasons.push(EntryReason::VolumeDominanceAligned),
                PressureDirection::Buying if !wants_long => warnings.push(EntryWarning::ContraDominanceVolume),
                PressureDirection::Selling if wants_long => warnings.push(EntryWarning::ContraDominanceVolume),
                _ => {}
            }
        }

        if let Some(divergence) = snapshot.obv_divergence {
            match divergence {
                ObvDivergence::Bullish if wants_long => reasons.push(EntryReason::VolumeDominanceAligned),
                ObvDivergence::Bearish if !wants_long => reasons.push(EntryReason::VolumeDominanceAligned),
                _ => {}
            }
        }
    }

    let confidence = snapshot.composite.confidence;
    if confidence < config.min_confidence_to_enter {
        direction = TradeDirection::None;
    }

    let should_enter = direction != TradeDirection::None && warnings.len() <= 4;
    let direction = if warnings.len() >= 5 { TradeDirection::None } else { direction };

    let (stop_loss, take_profit, size_multiplier) = if direction == TradeDirection::None {
        (None, None, 0.0)
    } else {
        let params = regime_params(regime.confirmed, regime.confidence);
        let atr_value = snapshot.atr.unwrap_or(price * DEFAULT_ATR_PCT / 100.0);

        let sl_move = (atr_value * config.atr_stop_loss_multiplier * params.stop_loss_multiplier)
            .max(price * STOP_LOSS_FLOOR_PCT / 100.0);
        let tp_move = (atr_value * config.atr_take_profit_multiplier * params.take_profit_multiplier)
            .max(price * TAKE_PROFIT_FLOOR_PCT / 100.0);

        let dir: Direction = if direction == TradeDirection::Long { Direction::Long } else { Direction::Short };
        let (sl, tp) = match dir {
            Direction::Long => (price - sl_move, price + tp_move),
            Direction::Short => (price + sl_move, price - tp_move),
        };

        let size = (params.size_multiplier * size_multiplier_for_confidence(confidence))
            .clamp(config.min_position_size_multiplier, config.max_position_size_multiplier);

        (Some(sl), Some(tp), size)
    };

    EntrySignal {
        direction,
        should_enter: should_enter && direction != TradeDirection::None,
        score,
        confidence,
        reasons,
        warnings,
        stop_loss,
        take_profit,
        size_multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Timeframe;
    use crate::indicators::composite::{calculate_composite, CompositeInputs};
    use crate::regime::RegimeState;

    fn snapshot_with_score(score_inputs: CompositeInputs, price: f64) -> IndicatorSnapshot {
        let composite = calculate_composite(&score_inputs);
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
            ema_trend: score_inputs.ema_trend,
            rsi: score_inputs.rsi.map(|v| crate::indicators::snapshot::RsiReading {
                value: v,
                zone: crate::indicators::snapshot::rsi_zone(v),
            }),
            macd: score_inputs.macd,
            bollinger: score_inputs.bollinger,
            atr: Some(price * 0.01),
            atr_percent: Some(1.0),
            atr_level: Some(AtrLevel::Normal),
            adx: None,
            vwap: score_inputs.vwap,
            volume_pressure: score_inputs.volume_pressure,
            volume_spike: None,
            volume_momentum: score_inputs.volume_momentum,
            obv_trend: None,
            obv_divergence: score_inputs.obv_divergence,
            composite,
        }
    }

    fn bullish_inputs(price: f64) -> CompositeInputs {
        CompositeInputs {
            price,
            rsi: Some(25.0),
            macd: Some(crate::indicators::macd::MacdResult {
                macd: 1.0,
                signal: 0.2,
                histogram: 0.8,
                crossover: crate::indicators::macd::MacdCrossover::Bullish,
            }),
            ema_trend: Trend::StrongBullish,
            ema21: Some(price * 0.99),
            bollinger: Some(crate::indicators::bollinger::BollingerResult {
                upper: price * 1.02,
                middle: price,
                lower: price * 0.98,
                width: 4.0,
                percent_b: 0.1,
            }),
            vwap: Some(price * 0.99),
            volume_pressure: Some(VolumePressure { direction: PressureDirection::Buying, ratio: 0.9 }),
            volume_momentum: Some(0.5),
            obv_divergence: None,
        }
    }

    #[test]
    fn regime_filter_blocks_volatile_regardless_of_score() {
        let snap = snapshot_with_score(bullish_inputs(100.0), 100.0);
        let regime = RegimeState { confirmed: Regime::Volatile, confidence: 80.0, pending: None, pending_count: 0 };
        let mut cfg = StrategyConfig::default();
        cfg.enable_regime_filter = true;
        let signal = generate_entry_signal(&snap, &regime, 100.0, &cfg);
        assert_eq!(signal.direction, TradeDirection::None);
        assert!(!signal.should_enter);
    }

    #[test]
    fn strong_bullish_composite_yields_long_with_risk_levels() {
        let snap = snapshot_with_score(bullish_inputs(100.0), 100.0);
        let regime = RegimeState { confirmed: Regime::TrendingBullish, confidence: 80.0, pending: None, pending_count: 0 };
        let cfg = StrategyConfig::default();
        let signal = generate_entry_signal(&snap, &regime, 100.0, &cfg);
        assert_eq!(signal.direction, TradeDirection::Long);
        assert!(signal.should_enter);
        assert!(signal.stop_loss.unwrap() < 100.0);
        assert!(signal.take_profit.unwrap() > 100.0);
        assert!(signal.size_multiplier > 0.0);
    }

    #[test]
    fn low_confidence_forces_none() {
        let mut inputs = bullish_inputs(100.0);
        // Dilute every sub-signal so the composite score/confidence both sit
        // below the entry threshold.
        inputs.rsi = Some(50.0);
        inputs.macd = None;
        inputs.ema_trend = Trend::Neutral;
        inputs.bollinger = None;
        inputs.volume_pressure = None;
        inputs.volume_momentum = None;
        let snap = snapshot_with_score(inputs, 100.0);
        let regime = RegimeState { confirmed: Regime::TrendingBullish, confidence: 80.0, pending: None, pending_count: 0 };
        let cfg = StrategyConfig::default();
        let signal = generate_entry_signal(&snap, &regime, 100.0, &cfg);
        assert_eq!(signal.direction, TradeDirection::None);
    }

    #[test]
    fn ranging_regime_respects_allow_trading_flag() {
        let snap = snapshot_with_score(bullish_inputs(100.0), 100.0);
        let regime = RegimeState { confirmed: Regime::Ranging, confidence: 50.0, pending: None, pending_count: 0 };
        let mut cfg = StrategyConfig::default();
        cfg.enable_regime_filter = true;
        cfg.allow_trading_in_ranging = false;
        let signal = generate_entry_signal(&snap, &regime, 100.0, &cfg);
        assert_eq!(signal.direction, TradeDirection::None);
    }
}
