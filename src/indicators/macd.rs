// =============================================================================
// MACD (12, 26, 9)
// =============================================================================
//
// No teacher file computes MACD; it's built from `calculate_ema`'s own
// recurrence (EMA-of-EMA for the signal line), mirroring how the teacher
// layers simpler pieces instead of importing a dedicated TA crate.

use crate::indicators::ema::calculate_ema;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdCrossover {
    Bullish,
    Bearish,
    None,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    /// Compares the current and prior sign of `macd - signal`: a flip from
    /// negative to positive is `Bullish`, positive to negative `Bearish`.
    pub crossover: MacdCrossover,
}

/// MACD line = EMA12 - EMA26, signal = EMA9 of the MACD line, histogram =
/// MACD - signal. `None` if there isn't enough history for all three EMAs
/// plus one prior signal-line point (needed for crossover detection).
pub fn calculate_macd(closes: &[f64]) -> Option<MacdResult> {
    let ema12 = calculate_ema(closes, 12);
    let ema26 = calculate_ema(closes, 26);
    if ema12.is_empty() || ema26.is_empty() {
        return None;
    }

    // ema12 is the longer series (smaller period => fewer consumed closes).
    let offset = ema12.len().checked_sub(ema26.len())?;
    let macd_line: Vec<f64> = ema26
        .iter()
        .enumerate()
        .map(|(i, e26)| ema12[i + offset] - e26)
        .collect();

    if macd_line.len() < 9 {
        return None;
    }

    let signal_series = calculate_ema(&macd_line, 9);
    if signal_series.len() < 2 {
        return None;
    }

    let macd = *macd_line.last()?;
    let signal = *signal_series.last()?;
    let histogram = macd - signal;

    // The signal series is shorter than macd_line by (9 - 1) elements since
    // it's seeded from an SMA of the first 9 macd values; align the prior
    // macd value against the prior signal value by the same offset used
    // above for the macd/signal pair itself.
    let prior_offset = macd_line.len() - signal_series.len();
    let prior_macd = macd_line[prior_offset + signal_series.len() - 2];
    let prior_signal = signal_series[signal_series.len() - 2];
    let prior_diff = prior_macd - prior_signal;

    let crossover = if prior_diff <= 0.0 && histogram > 0.0 {
        MacdCrossover::Bullish
    } else if prior_diff >= 0.0 && histogram < 0.0 {
        MacdCrossover::Bearish
    } else {
        MacdCrossover::None
    };

    Some(MacdResult {
        macd,
        signal,
        histogram,
        crossover,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_insufficient_data() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes).is_none());
    }

    #[test]
    fn macd_trending_market_is_positive() {
        let closes: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let result = calculate_macd(&closes).unwrap();
        assert!(result.macd > 0.0, "rising market should have positive MACD");
        assert!(result.macd.is_finite() && result.signal.is_finite());
    }

    #[test]
    fn macd_flat_market_is_near_zero() {
        let closes = vec![100.0; 100];
        let result = calculate_macd(&closes).unwrap();
        assert!(result.macd.abs() < 1e-9);
        assert!(result.histogram.abs() < 1e-9);
    }
}
