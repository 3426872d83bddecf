// =============================================================================
// Exponential Moving Average + multi-period trend classification
// =============================================================================
//
// `calculate_ema` keeps the SMA-seeded recurrence from `ema_trend_aligned`'s
// original 9/21/55 stack check; the stack itself moves to 9/21/50/200 and the
// binary bullish/bearish verdict becomes a five-way `Trend`, since a simple
// split can't distinguish "just crossed" from "fully stacked and extended".

use serde::Serialize;

/// EMA series, SMA-seeded at `period`. Empty if there isn't enough history,
/// or if a non-finite close appears anywhere in `closes`.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let sma: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sma);

    let mut prev_ema = sma;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        result.push(ema);
        prev_ema = ema;
    }

    result
}

pub fn current_ema(closes: &[f64], period: usize) -> Option<f64> {
    calculate_ema(closes, period).last().copied()
}

/// The four EMAs the composite signal and trend classifier watch. Any entry
/// is `None` if there wasn't enough history for that period yet.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmaCollection {
    pub ema9: Option<f64>,
    pub ema21: Option<f64>,
    pub ema50: Option<f64>,
    pub ema200: Option<f64>,
}

impl EmaCollection {
    pub fn compute(closes: &[f64]) -> Self {
        Self {
            ema9: current_ema(closes, 9),
            ema21: current_ema(closes, 21),
            ema50: current_ema(closes, 50),
            ema200: current_ema(closes, 200),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    StrongBullish,
    Bullish,
    #[default]
    Neutral,
    Bearish,
    StrongBearish,
}

/// The three boolean cross states the spec asks the snapshot to carry
/// alongside the four EMAs: `None` when a leg can't be compared yet.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmaCrossState {
    pub nine_above_twentyone: Option<bool>,
    pub twentyone_above_fifty: Option<bool>,
    pub fifty_above_two_hundred: Option<bool>,
}

impl EmaCrossState {
    pub fn compute(emas: &EmaCollection) -> Self {
        Self {
            nine_above_twentyone: Option::zip(emas.ema9, emas.ema21).map(|(a, b)| a > b),
            twentyone_above_fifty: Option::zip(emas.ema21, emas.ema50).map(|(a, b)| a > b),
            fifty_above_two_hundred: Option::zip(emas.ema50, emas.ema200).map(|(a, b)| a > b),
        }
    }
}

/// Classify trend from the EMA stack and current price.
///
/// Only the shorter EMAs (9, 21) are required for a non-neutral verdict: a
/// missing ema50/ema200 simply leaves the higher "strong" tier unreachable
/// rather than forcing `Neutral` outright, per spec §4.2's "only shorter
/// EMAs are required" rule.
pub fn classify_trend(emas: &EmaCollection, price: f64) -> Trend {
    let (Some(e9), Some(e21)) = (emas.ema9, emas.ema21) else {
        return Trend::Neutral;
    };

    let bullish_short = e9 > e21;
    let bearish_short = e9 < e21;
    if !bullish_short && !bearish_short {
        return Trend::Neutral;
    }

    // Mid confirmation (ema21 vs ema50) only applies if ema50 is present;
    // absent, the short-leg verdict stands uncontradicted.
    let mid_confirms_bullish = emas.ema50.map(|e50| e21 > e50).unwrap_or(true);
    let mid_confirms_bearish = emas.ema50.map(|e50| e21 < e50).unwrap_or(true);

    let bullish_mid = bullish_short && mid_confirms_bullish;
    let bearish_mid = bearish_short && mid_confirms_bearish;

    if !bullish_mid && !bearish_mid {
        return Trend::Neutral;
    }

    // The "strong" tier additionally requires ema50 > ema200 (or the mirror)
    // and price extended beyond ema9 — both higher tiers, left off when
    // ema50/ema200 aren't available yet.
    let long_confirms_bullish = Option::zip(emas.ema50, emas.ema200)
        .map(|(e50, e200)| e50 > e200)
        .unwrap_or(false);
    let long_confirms_bearish = Option::zip(emas.ema50, emas.ema200)
        .map(|(e50, e200)| e50 < e200)
        .unwrap_or(false);

    if bullish_mid && long_confirms_bullish && price > e9 {
        Trend::StrongBullish
    } else if bullish_mid {
        Trend::Bullish
    } else if bearish_mid && long_confirms_bearish && price < e9 {
        Trend::StrongBearish
    } else {
        Trend::Bearish
    }
}
