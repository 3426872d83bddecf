// =============================================================================
// Market Regime Detector
// =============================================================================
//
// Rewritten from the entropy/BBW/Hurst/ADX detection hierarchy: this version
// classifies on ATR level, ADX (with its +DI/-DI split) and the EMA trend
// stack only — entropy and the Hurst exponent are dropped, there is no
// Shannon-entropy "DEAD" regime or Bollinger-width "SQUEEZE" regime in this
// taxonomy. What's kept from the teacher is the detector's overall shape: a
// pure `classify` function plus a stateful wrapper that tracks how long the
// current regime has held and smooths out single-tick flicker.
//
// Five regimes: trending_bullish, trending_bearish, ranging, volatile,
// unknown. A raw classification only becomes the *confirmed* regime after
// `STABILITY_REQUIRED` consecutive ticks agree — except `Volatile`, which
// overrides immediately, since waiting five ticks to recognise a volatility
// spike defeats the point of detecting one.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::indicators::adx::AdxResult;
use crate::indicators::atr::AtrLevel;
use crate::indicators::ema::Trend as EmaTrend;

pub const STABILITY_REQUIRED: u32 = 5;

/// ADX level required to *enter* a trending classification from a
/// non-trending confirmed regime.
const ADX_ENTER_TRENDING: f64 = 25.0;
/// ADX level required to *stay* classified as trending once already
/// confirmed trending — lower than the entry bar so a trend isn't declared
/// over the instant ADX dips below 25.
const ADX_EXIT_TRENDING: f64 = 18.0;
const ADX_LOW_RANGING_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    TrendingBullish,
    TrendingBearish,
    Ranging,
    Volatile,
    Unknown,
}

impl Regime {
    pub fn is_trending(self) -> bool {
        matches!(self, Regime::TrendingBullish | Regime::TrendingBearish)
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TrendingBullish => "trending_bullish",
            Self::TrendingBearish => "trending_bearish",
            Self::Ranging => "ranging",
            Self::Volatile => "volatile",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A single-tick classification with no memory of prior ticks, plus its
/// confidence in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawClassification {
    pub regime: Regime,
    pub confidence: f64,
}

fn ema_alignment(ema_trend: EmaTrend, bullish: bool) -> Option<bool> {
    // Returns `Some(is_strong)` when the EMA trend agrees with the given
    // direction, `None` when it doesn't (or is neutral/mixed).
    match (ema_trend, bullish) {
        (EmaTrend::Bullish, true) => Some(false),
        (EmaTrend::StrongBullish, true) => Some(true),
        (EmaTrend::Bearish, false) => Some(false),
        (EmaTrend::StrongBearish, false) => Some(true),
        _ => None,
    }
}

fn trending_confidence(adx: f64, ema_trend: EmaTrend, bullish: bool) -> f64 {
    let adx_bonus = if adx >= 50.0 {
        25.0
    } else if adx >= 35.0 {
        15.0
    } else if adx >= 25.0 {
        5.0
    } else {
        0.0
    };

    let ema_bonus = match ema_alignment(ema_trend, bullish) {
        Some(true) => 25.0,
        Some(false) => 20.0,
        None => 0.0,
    };

    (50.0 + adx_bonus + ema_bonus).min(95.0)
}

/// Single-tick classification from the raw indicator readings, with no
/// memory of prior ticks except `currently_trending` (whether the
/// *confirmed* regime is presently one of the two trending states) — needed
/// because the ADX bar to stay trending (18) is lower than the bar to enter
/// one (25).
///
/// `atr_level` is `None` when there isn't enough candle history for ATR yet,
/// in which case the volatility override simply doesn't apply (it falls
/// through to the ADX-driven branches, and ultimately to `Unknown` if ADX is
/// also unavailable).
pub fn classify(
    atr_level: Option<AtrLevel>,
    adx: Option<&AdxResult>,
    ema_trend: EmaTrend,
    currently_trending: bool,
) -> RawClassification {
    match atr_level {
        Some(AtrLevel::Extreme) => {
            return RawClassification {
                regime: Regime::Volatile,
                confidence: 85.0,
            }
        }
        Some(AtrLevel::High) => {
            return RawClassification {
                regime: Regime::Volatile,
                confidence: 70.0,
            }
        }
        _ => {}
    }

    let Some(adx) = adx else {
        return RawClassification {
            regime: Regime::Unknown,
            confidence: 0.0,
        };
    };

    let trend_threshold = if currently_trending {
        ADX_EXIT_TRENDING
    } else {
        ADX_ENTER_TRENDING
    };

    if adx.adx >= trend_threshold {
        let di_direction = if adx.plus_di > adx.minus_di {
            Some(true)
        } else if adx.minus_di > adx.plus_di {
            Some(false)
        } else {
            None
        };
        let ema_direction = match ema_trend {
            EmaTrend::StrongBullish => Some(true),
            EmaTrend::StrongBearish => Some(false),
            _ => None,
        };

        let direction = match (di_direction, ema_direction) {
            (Some(d), Some(e)) if d == e => Some(d),
            (Some(d), Some(_)) => None, // conflicting signals: no clear direction
            (Some(d), None) => Some(d),
            (None, Some(e)) => Some(e),
            (None, None) => None,
        };

        return match direction {
            Some(bullish) => RawClassification {
                regime: if bullish {
                    Regime::TrendingBullish
                } else {
                    Regime::TrendingBearish
                },
                confidence: trending_confidence(adx.adx, ema_trend, bullish),
            },
            None => RawClassification {
                regime: Regime::Ranging,
                confidence: 50.0,
            },
        };
    }

    RawClassification {
        regime: Regime::Ranging,
        confidence: if adx.adx < ADX_LOW_RANGING_THRESHOLD {
            75.0
        } else {
            60.0
        },
    }
}

/// Hysteresis state: the regime callers should act on (`confirmed`) and its
/// confidence, plus whatever raw classification is trying to displace it and
/// how many consecutive ticks it has held so far.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeState {
    pub confirmed: Regime,
    pub confidence: f64,
    pub pending: Option<Regime>,
    pub pending_count: u32,
}

impl Default for RegimeState {
    fn default() -> Self {
        Self {
            confirmed: Regime::Unknown,
            confidence: 0.0,
            pending: None,
            pending_count: 0,
        }
    }
}

/// SL/TP multipliers (applied to ATR) and a position-size multiplier, keyed
/// by confirmed regime.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegimeParams {
    pub stop_loss_multiplier: f64,
    pub take_profit_multiplier: f64,
    pub size_multiplier: f64,
}

pub fn regime_params(regime: Regime, confidence: f64) -> RegimeParams {
    match regime {
        Regime::Volatile => RegimeParams {
            stop_loss_multiplier: 2.0,
            take_profit_multiplier: 3.0,
            size_multiplier: 0.5,
        },
        Regime::TrendingBullish | Regime::TrendingBearish => RegimeParams {
            stop_loss_multiplier: 1.5,
            take_profit_multiplier: 2.5,
            size_multiplier: if confidence >= 70.0 { 1.2 } else { 1.0 },
        },
        Regime::Ranging => RegimeParams {
            stop_loss_multiplier: 1.0,
            take_profit_multiplier: 1.5,
            size_multiplier: 0.8,
        },
        Regime::Unknown => RegimeParams {
            stop_loss_multiplier: 1.5,
            take_profit_multiplier: 2.0,
            size_multiplier: 0.5,
        },
    }
}

pub struct RegimeDetector {
    state: RwLock<RegimeState>,
}

impl Default for RegimeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl RegimeDetector {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegimeState::default()),
        }
    }

    /// Run full regime detection from already-computed indicator readings
    /// and fold the raw classification through the hysteresis state
    /// machine, returning the (possibly unchanged) confirmed regime.
    pub fn update(&self, atr_level: Option<AtrLevel>, adx: Option<&AdxResult>, ema_trend: EmaTrend) -> RegimeState {
        let currently_trending = self.state.read().confirmed.is_trending();
        let raw = classify(atr_level, adx, ema_trend, currently_trending);
        self.fold(raw)
    }

    fn fold(&self, raw: RawClassification) -> RegimeState {
        let mut state = self.state.write();

        if raw.regime == Regime::Volatile {
            state.confirmed = Regime::Volatile;
            state.confidence = raw.confidence;
            state.pending = None;
            state.pending_count = 0;
            return *state;
        }

        // The confirmed regime initialises from the first non-unknown
        // reading (spec §4.3) — this is a cold start, not a replacement, so
        // it bypasses the hysteresis counter entirely.
        if state.confirmed == Regime::Unknown && raw.regime != Regime::Unknown {
            state.confirmed = raw.regime;
            state.confidence = raw.confidence;
            state.pending = None;
            state.pending_count = 0;
            return *state;
        }

        if raw.regime == state.confirmed {
            state.confidence = raw.confidence;
            state.pending = None;
            state.pending_count = 0;
        } else if state.pending == Some(raw.regime) {
            state.pending_count += 1;
            if state.pending_count >= STABILITY_REQUIRED {
                state.confirmed = raw.regime;
                state.confidence = raw.confidence;
                state.pending = None;
                state.pending_count = 0;
            }
        } else {
            state.pending = Some(raw.regime);
            state.pending_count = 1;
        }

        *state
    }

    pub fn current(&self) -> RegimeState {
        *self.state.read()
    }

    pub fn params(&self) -> RegimeParams {
        let state = self.current();
        regime_params(state.confirmed, state.confidence)
    }

    pub fn reset(&self) {
        *self.state.write() = RegimeState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::adx::AdxStrength;

    fn adx(value: f64, plus: f64, minus: f64) -> AdxResult {
        AdxResult {
            adx: value,
            plus_di: plus,
            minus_di: minus,
            strength: AdxStrength::Moderate,
        }
    }

    #[test]
    fn classify_extreme_atr_is_volatile_with_high_confidence() {
        let r = classify(Some(AtrLevel::Extreme), None, EmaTrend::Neutral, false);
        assert_eq!(r.regime, Regime::Volatile);
        assert_eq!(r.confidence, 85.0);
    }

    #[test]
    fn classify_high_atr_is_volatile_with_lower_confidence() {
        let r = classify(Some(AtrLevel::High), None, EmaTrend::Neutral, false);
        assert_eq!(r.regime, Regime::Volatile);
        assert_eq!(r.confidence, 70.0);
    }

    #[test]
    fn classify_unknown_without_adx() {
        let r = classify(Some(AtrLevel::Normal), None, EmaTrend::Neutral, false);
        assert_eq!(r.regime, Regime::Unknown);
    }

    #[test]
    fn classify_ranging_low_adx() {
        let a = adx(15.0, 18.0, 17.0);
        let r = classify(Some(AtrLevel::Normal), Some(&a), EmaTrend::Neutral, false);
        assert_eq!(r.regime, Regime::Ranging);
        assert_eq!(r.confidence, 75.0);
    }

    #[test]
    fn classify_ranging_mid_adx_lower_confidence() {
        let a = adx(22.0, 18.0, 17.0);
        let r = classify(Some(AtrLevel::Normal), Some(&a), EmaTrend::Neutral, false);
        assert_eq!(r.regime, Regime::Ranging);
        assert_eq!(r.confidence, 60.0);
    }

    #[test]
    fn classify_trending_bullish_from_di_direction() {
        let a = adx(30.0, 28.0, 10.0);
        let r = classify(Some(AtrLevel::Normal), Some(&a), EmaTrend::Bullish, false);
        assert_eq!(r.regime, Regime::TrendingBullish);
    }

    #[test]
    fn classify_trending_bearish_from_di_direction() {
        let a = adx(30.0, 10.0, 28.0);
        let r = classify(Some(AtrLevel::Normal), Some(&a), EmaTrend::Bearish, false);
        assert_eq!(r.regime, Regime::TrendingBearish);
    }

    #[test]
    fn classify_strength_without_direction_is_ranging() {
        // conflicting DI vs EMA signals: DI says bullish, EMA says strong bearish.
        let a = adx(30.0, 28.0, 10.0);
        let r = classify(Some(AtrLevel::Normal), Some(&a), EmaTrend::StrongBearish, false);
        assert_eq!(r.regime, Regime::Ranging);
        assert_eq!(r.confidence, 50.0);
    }

    #[test]
    fn classify_stays_trending_at_lower_adx_when_already_trending() {
        let a = adx(20.0, 22.0, 10.0);
        // Below the 25 entry bar but above the 18 exit bar, and already trending.
        let r = classify(Some(AtrLevel::Normal), Some(&a), EmaTrend::Bullish, true);
        assert_eq!(r.regime, Regime::TrendingBullish);

        // Same ADX reading, but not already trending: doesn't clear the entry bar.
        let r2 = classify(Some(AtrLevel::Normal), Some(&a), EmaTrend::Bullish, false);
        assert_eq!(r2.regime, Regime::Ranging);
    }

    #[test]
    fn trending_confidence_capped_at_95() {
        let a = adx(80.0, 40.0, 5.0);
        let r = classify(Some(AtrLevel::Normal), Some(&a), EmaTrend::StrongBullish, false);
        assert_eq!(r.confidence, 95.0);
    }

    #[test]
    fn first_non_unknown_reading_confirms_immediately() {
        let detector = RegimeDetector::new();
        assert_eq!(detector.current().confirmed, Regime::Unknown);

        let state = detector.fold(RawClassification {
            regime: Regime::Ranging,
            confidence: 75.0,
        });
        assert_eq!(state.confirmed, Regime::Ranging);
        assert_eq!(state.pending_count, 0);
    }

    #[test]
    fn hysteresis_requires_five_consecutive_ticks_to_replace_a_confirmed_regime() {
        let detector = RegimeDetector::new();
        detector.fold(RawClassification {
            regime: Regime::TrendingBullish,
            confidence: 80.0,
        });
        assert_eq!(detector.current().confirmed, Regime::TrendingBullish);

        let raw = RawClassification {
            regime: Regime::Ranging,
            confidence: 75.0,
        };
        for i in 0..4 {
            let state = detector.fold(raw);
            assert_eq!(state.confirmed, Regime::TrendingBullish, "tick {i}");
            assert_eq!(state.pending_count, i + 1);
        }
        let state = detector.fold(raw);
        assert_eq!(state.confirmed, Regime::Ranging);
    }

    /// Spec §8 scenario 4: four more `trending_bullish` readings (no-op, pending
    /// reset each time) after an initial confirmed `trending_bullish`, then five
    /// `ranging` readings — only the fifth flips the confirmed regime.
    #[test]
    fn scenario_trending_bullish_then_ranging_stream() {
        let detector = RegimeDetector::new();
        let bullish = RawClassification { regime: Regime::TrendingBullish, confidence: 80.0 };
        let ranging = RawClassification { regime: Regime::Ranging, confidence: 75.0 };

        assert_eq!(detector.fold(bullish).confirmed, Regime::TrendingBullish);
        for _ in 0..4 {
            assert_eq!(detector.fold(bullish).confirmed, Regime::TrendingBullish);
        }
        for i in 0..4 {
            let state = detector.fold(ranging);
            assert_eq!(state.confirmed, Regime::TrendingBullish, "ranging tick {i}");
        }
        assert_eq!(detector.fold(ranging).confirmed, Regime::Ranging);
    }

    #[test]
    fn volatile_bypasses_hysteresis() {
        let detector = RegimeDetector::new();
        let state = detector.fold(RawClassification {
            regime: Regime::Volatile,
            confidence: 85.0,
        });
        assert_eq!(state.confirmed, Regime::Volatile);
        assert_eq!(state.pending_count, 0);
    }

    #[test]
    fn flicker_resets_pending_count() {
        let detector = RegimeDetector::new();
        detector.fold(RawClassification {
            regime: Regime::Ranging,
            confidence: 75.0,
        });
        detector.fold(RawClassification {
            regime: Regime::Ranging,
            confidence: 75.0,
        });
        let state = detector.fold(RawClassification {
            regime: Regime::TrendingBullish,
            confidence: 80.0,
        });
        assert_eq!(state.pending, Some(Regime::TrendingBullish));
        assert_eq!(state.pending_count, 1);
    }

    #[test]
    fn regime_params_lookup() {
        let p = regime_params(Regime::Volatile, 0.0);
        assert_eq!(p.size_multiplier, 0.5);
        let p = regime_params(Regime::TrendingBullish, 75.0);
        assert_eq!(p.size_multiplier, 1.2);
        let p = regime_params(Regime::TrendingBullish, 50.0);
        assert_eq!(p.size_multiplier, 1.0);
        let p = regime_params(Regime::Ranging, 0.0);
        assert_eq!(p.size_multiplier, 0.8);
        let p = regime_params(Regime::Unknown, 0.0);
        assert_eq!(p.size_multiplier, 0.5);
    }
}
