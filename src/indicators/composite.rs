// =============================================================================
// Composite signal — weighted blend of RSI, MACD, EMA trend, Bollinger %B,
// and volume pressure
// =============================================================================
//
// Rewritten from `signals/weighted_score.rs`'s shape: named per-indicator
// contributions rolled into one total score. That file scored a caller-
// supplied list of named signals against a regime-dependent weight map; this
// version fixes the five inputs, their weights (20/25/25/15/15 of 100), and
// each sub-signal's exact bucketing formula, since the entry/exit generators
// always reason about the same five indicators the same way. Each
// sub-signal is clamped to [-1, 1] before weighting. A missing indicator
// (not enough history yet) contributes 0 to the score and is recorded as
// `None` in `components` rather than silently treated as neutral data.

use crate::indicators::bollinger::BollingerResult;
use crate::indicators::ema::Trend;
use crate::indicators::macd::{MacdCrossover, MacdResult};
use crate::indicators::obv::ObvDivergence;
use crate::indicators::volume::{PressureDirection, VolumePressure};
use serde::Serialize;

const RSI_WEIGHT: f64 = 20.0;
const MACD_WEIGHT: f64 = 25.0;
const EMA_WEIGHT: f64 = 25.0;
const BB_WEIGHT: f64 = 15.0;
const VOLUME_WEIGHT: f64 = 15.0;

const AGREEMENT_THRESHOLD: f64 = 0.2;

#[derive(Debug, Default)]
pub struct CompositeInputs {
    pub price: f64,
    pub rsi: Option<f64>,
    pub macd: Option<MacdResult>,
    pub ema_trend: Trend,
    /// EMA21 value, used only for the EMA sub-signal's price-extension
    /// adjustment (spec §4.2).
    pub ema21: Option<f64>,
    pub bollinger: Option<BollingerResult>,
    pub vwap: Option<f64>,
    pub volume_pressure: Option<VolumePressure>,
    pub volume_momentum: Option<f64>,
    pub obv_divergence: Option<ObvDivergence>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CompositeComponents {
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub ema: Option<f64>,
    pub bollinger: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompositeResult {
    /// Weighted sum in [-100, 100].
    pub score: f64,
    pub components: CompositeComponents,
    pub recommendation: Recommendation,
    /// `min(100, agreementCount * 20 + |score|)`.
    pub confidence: f64,
}

/// RSI sub-signal: extreme oversold reads bullish, extreme overbought reads
/// bearish, with a dead zone of 0 in the 40-60 middle.
fn rsi_subsignal(rsi: f64) -> f64 {
    if rsi <= 20.0 {
        1.0
    } else if rsi <= 30.0 {
        0.7
    } else if rsi <= 40.0 {
        0.3
    } else if rsi < 60.0 {
        0.0
    } else if rsi < 70.0 {
        -0.3
    } else if rsi < 80.0 {
        -0.7
    } else {
        -1.0
    }
}

/// MACD sub-signal: a fresh crossover dominates; absent one, the sign of
/// the histogram scaled by its magnitude (capped at 0.6) carries it.
fn macd_subsignal(macd: &MacdResult) -> f64 {
    match macd.crossover {
        MacdCrossover::Bullish => 0.8,
        MacdCrossover::Bearish => -0.8,
        MacdCrossover::None => {
            let magnitude = (macd.histogram.abs() * 10.0).min(0.6);
            if macd.histogram >= 0.0 {
                magnitude
            } else {
                -magnitude
            }
        }
    }
}

/// EMA sub-signal: trend bucket, adjusted for price extension beyond ema21.
fn ema_subsignal(trend: Trend, price: f64, ema21: Option<f64>) -> f64 {
    let base = match trend {
        Trend::StrongBullish => 0.8,
        Trend::Bullish => 0.5,
        Trend::Neutral => 0.0,
        Trend::Bearish => -0.5,
        Trend::StrongBearish => -0.8,
    };

    let adjustment = match ema21 {
        Some(ema21) if ema21 != 0.0 => {
            let deviation_pct = (price - ema21) / ema21 * 100.0;
            if deviation_pct > 2.0 {
                -0.2
            } else if deviation_pct < -2.0 {
                0.2
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    (base + adjustment).clamp(-1.0, 1.0)
}

fn bollinger_subsignal(bb: &BollingerResult) -> f64 {
    if bb.percent_b <= 0.0 {
        0.7
    } else if bb.percent_b <= 0.2 {
        0.4
    } else if bb.percent_b >= 1.0 {
        -0.7
    } else if bb.percent_b >= 0.8 {
        -0.4
    } else {
        0.0
    }
}

/// Volume sub-signal: blends VWAP position, buy/sell dominance, momentum
/// sign, and OBV divergence. Any input that isn't available contributes
/// nothing (rather than forcing the whole sub-signal to `None`) since the
/// spec treats this as one composite reading built from several partial
/// observations.
fn volume_subsignal(
    price: f64,
    vwap: Option<f64>,
    pressure: Option<&VolumePressure>,
    momentum: Option<f64>,
    divergence: Option<ObvDivergence>,
) -> f64 {
    let mut total = 0.0;

    if let Some(vwap) = vwap {
        total += if price > vwap { 0.3 } else { -0.3 };
    }

    if let Some(pressure) = pressure {
        total += match pressure.direction {
            PressureDirection::Buying => 0.3,
            PressureDirection::Selling => -0.3,
            PressureDirection::Neutral => 0.0,
        };
    }

    if let Some(momentum) = momentum {
        if momentum.abs() > 0.1 {
            total += 0.2 * momentum.signum();
        }
    }

    if let Some(divergence) = divergence {
        total += match divergence {
            ObvDivergence::Bullish => 0.3,
            ObvDivergence::Bearish => -0.3,
            ObvDivergence::None => 0.0,
        };
    }

    total.clamp(-1.0, 1.0)
}

fn recommend(score: f64) -> Recommendation {
    if score >= 40.0 {
        Recommendation::StrongBuy
    } else if score >= 15.0 {
        Recommendation::Buy
    } else if score <= -40.0 {
        Recommendation::StrongSell
    } else if score <= -15.0 {
        Recommendation::Sell
    } else {
        Recommendation::Neutral
    }
}

/// Compute the weighted composite score. EMA trend always contributes since
/// `Trend::Neutral` is itself a meaningful (zero) reading; the other four
/// are `None` — and contribute 0 to the score — until their indicator has
/// enough history.
///
/// Volume is always computed (never `None` in `components`) since it
/// degrades gracefully input-by-input rather than requiring every one of
/// its four inputs to be present at once; an entirely empty set of volume
/// inputs simply yields 0.
pub fn calculate_composite(inputs: &CompositeInputs) -> CompositeResult {
    let rsi_c = inputs.rsi.map(rsi_subsignal);
    let macd_c = inputs.macd.as_ref().map(macd_subsignal);
    let ema_c = Some(ema_subsignal(inputs.ema_trend, inputs.price, inputs.ema21));
    let bb_c = inputs.bollinger.as_ref().map(bollinger_subsignal);
    let vol_c = Some(volume_subsignal(
        inputs.price,
        inputs.vwap,
        inputs.volume_pressure.as_ref(),
        inputs.volume_momentum,
        inputs.obv_divergence,
    ));

    let score = RSI_WEIGHT * rsi_c.unwrap_or(0.0)
        + MACD_WEIGHT * macd_c.unwrap_or(0.0)
        + EMA_WEIGHT * ema_c.unwrap_or(0.0)
        + BB_WEIGHT * bb_c.unwrap_or(0.0)
        + VOLUME_WEIGHT * vol_c.unwrap_or(0.0);

    let sub_signals = [rsi_c, macd_c, ema_c, bb_c, vol_c];
    let positive = sub_signals
        .iter()
        .filter(|s| s.is_some_and(|v| v > AGREEMENT_THRESHOLD))
        .count();
    let negative = sub_signals
        .iter()
        .filter(|s| s.is_some_and(|v| v < -AGREEMENT_THRESHOLD))
        .count();
    let agreement_count = positive.max(negative);

    let confidence = (agreement_count as f64 * 20.0 + score.abs()).min(100.0);

    CompositeResult {
        score,
        components: CompositeComponents {
            rsi: rsi_c,
            macd: macd_c,
            ema: ema_c,
            bollinger: bb_c,
            volume: vol_c,
        },
        recommendation: recommend(score),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::bollinger::BollingerResult;

    #[test]
    fn all_missing_yields_zero_score_except_ema_and_volume_neutral() {
        let inputs = CompositeInputs::default();
        let result = calculate_composite(&inputs);
        assert_eq!(result.score, 0.0);
        assert!(result.components.rsi.is_none());
        assert!(result.components.macd.is_none());
        assert_eq!(result.components.ema, Some(0.0));
        assert_eq!(result.components.volume, Some(0.0));
        assert_eq!(result.recommendation, Recommendation::Neutral);
    }

    #[test]
    fn fully_bullish_inputs_score_positive_and_strong_buy() {
        let inputs = CompositeInputs {
            price: 100.0,
            rsi: Some(15.0),
            macd: Some(MacdResult {
                macd: 2.0,
                signal: 1.0,
                histogram: 1.0,
                crossover: MacdCrossover::Bullish,
            }),
            ema_trend: Trend::StrongBullish,
            ema21: Some(99.0),
            bollinger: Some(BollingerResult {
                upper: 110.0,
                middle: 100.0,
                lower: 90.0,
                width: 20.0,
                percent_b: 0.0,
            }),
            vwap: Some(95.0),
            volume_pressure: Some(VolumePressure {
                direction: PressureDirection::Buying,
                ratio: 0.9,
            }),
            volume_momentum: Some(0.5),
            obv_divergence: Some(ObvDivergence::Bullish),
        };
        let result = calculate_composite(&inputs);
        assert!(result.score > 60.0, "expected strongly positive, got {}", result.score);
        assert_eq!(result.recommendation, Recommendation::StrongBuy);
    }

    #[test]
    fn fully_bearish_inputs_score_negative_and_strong_sell() {
        let inputs = CompositeInputs {
            price: 100.0,
            rsi: Some(90.0),
            macd: Some(MacdResult {
                macd: -2.0,
                signal: -1.0,
                histogram: -1.0,
                crossover: MacdCrossover::Bearish,
            }),
            ema_trend: Trend::StrongBearish,
            ema21: Some(101.0),
            bollinger: Some(BollingerResult {
                upper: 110.0,
                middle: 100.0,
                lower: 90.0,
                width: 20.0,
                percent_b: 1.0,
            }),
            vwap: Some(105.0),
            volume_pressure: Some(VolumePressure {
                direction: PressureDirection::Selling,
                ratio: 0.1,
            }),
            volume_momentum: Some(-0.5),
            obv_divergence: Some(ObvDivergence::Bearish),
        };
        let result = calculate_composite(&inputs);
        assert!(result.score < -60.0, "expected strongly negative, got {}", result.score);
        assert_eq!(result.recommendation, Recommendation::StrongSell);
    }

    #[test]
    fn rsi_subsignal_buckets() {
        assert_eq!(rsi_subsignal(10.0), 1.0);
        assert_eq!(rsi_subsignal(25.0), 0.7);
        assert_eq!(rsi_subsignal(35.0), 0.3);
        assert_eq!(rsi_subsignal(50.0), 0.0);
        assert_eq!(rsi_subsignal(65.0), -0.3);
        assert_eq!(rsi_subsignal(75.0), -0.7);
        assert_eq!(rsi_subsignal(95.0), -1.0);
    }

    #[test]
    fn bollinger_subsignal_buckets() {
        let bb = |percent_b: f64| BollingerResult {
            upper: 1.0,
            middle: 1.0,
            lower: 1.0,
            width: 0.0,
            percent_b,
        };
        assert_eq!(bollinger_subsignal(&bb(-0.1)), 0.7);
        assert_eq!(bollinger_subsignal(&bb(0.1)), 0.4);
        assert_eq!(bollinger_subsignal(&bb(0.5)), 0.0);
        assert_eq!(bollinger_subsignal(&bb(0.9)), -0.4);
        assert_eq!(bollinger_subsignal(&bb(1.1)), -0.7);
    }

    #[test]
    fn confidence_caps_at_100() {
        let inputs = CompositeInputs {
            price: 100.0,
            rsi: Some(5.0),
            macd: Some(MacdResult {
                macd: 5.0,
                signal: 1.0,
                histogram: 4.0,
                crossover: MacdCrossover::Bullish,
            }),
            ema_trend: Trend::StrongBullish,
            ema21: Some(90.0),
            bollinger: Some(BollingerResult {
                upper: 110.0,
                middle: 100.0,
                lower: 90.0,
                width: 20.0,
                percent_b: -0.1,
            }),
            vwap: Some(90.0),
            volume_pressure: Some(VolumePressure {
                direction: PressureDirection::Buying,
                ratio: 0.95,
            }),
            volume_momentum: Some(1.0),
            obv_divergence: Some(ObvDivergence::Bullish),
        };
        let result = calculate_composite(&inputs);
        assert!(result.confidence <= 100.0);
    }
}
