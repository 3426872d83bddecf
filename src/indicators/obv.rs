// =============================================================================
// On-Balance Volume — trend and price/volume divergence
// =============================================================================
//
// New — no teacher file computes OBV. Divergence detection compares OBV's
// short-term slope against price's, the same "compare two independently
// computed trends" idiom `ema::classify_trend` uses for the EMA stack.

use crate::candle::Candle;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObvTrend {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObvDivergence {
    Bullish,
    Bearish,
    None,
}

/// Cumulative OBV series: running total of `+volume` on up closes, `-volume`
/// on down closes, unchanged on an unchanged close. Empty if `candles` is
/// empty.
pub fn calculate_obv(candles: &[Candle]) -> Vec<f64> {
    if candles.is_empty() {
        return Vec::new();
    }

    let mut obv = Vec::with_capacity(candles.len());
    let mut running = 0.0;
    obv.push(running);

    for w in candles.windows(2) {
        let (prev, cur) = (w[0], w[1]);
        if cur.close > prev.close {
            running += cur.volume;
        } else if cur.close < prev.close {
            running -= cur.volume;
        }
        obv.push(running);
    }

    obv
}

/// OBV trend over the last `lookback` values: split the window into two
/// halves, compare the second-half mean against the first-half mean, and
/// classify by sign once the difference clears a 10% relative threshold
/// (relative to the first-half mean's magnitude). `None` if there aren't at
/// least `lookback` OBV points or `lookback` is too small to split in two.
pub fn obv_trend(obv: &[f64], lookback: usize) -> Option<ObvTrend> {
    if lookback < 2 || obv.len() < lookback {
        return None;
    }
    let window = &obv[obv.len() - lookback..];
    let half = lookback / 2;
    let first_half = &window[..half];
    let second_half = &window[half..];

    let first_mean = first_half.iter().sum::<f64>() / first_half.len() as f64;
    let second_mean = second_half.iter().sum::<f64>() / second_half.len() as f64;
    let diff = second_mean - first_mean;
    let threshold = 0.1 * first_mean.abs();

    Some(if diff.abs() <= threshold {
        ObvTrend::Flat
    } else if diff > 0.0 {
        ObvTrend::Rising
    } else {
        ObvTrend::Falling
    })
}

/// Price/volume divergence over `lookback` bars: `Bullish` when OBV rises
/// while price falls at least 1%; `Bearish` when OBV falls while price
/// rises at least 1%. `None` if there's no divergence, or if either trend
/// can't be computed yet.
pub fn detect_divergence(candles: &[Candle], obv: &[f64], lookback: usize) -> Option<ObvDivergence> {
    if lookback == 0 || candles.len() < lookback + 1 {
        return None;
    }
    let price_start = candles[candles.len() - lookback - 1].close;
    let price_end = candles.last()?.close;
    if price_start == 0.0 {
        return None;
    }
    let price_change_pct = (price_end - price_start) / price_start * 100.0;

    let trend = obv_trend(obv, lookback)?;

    let divergence = match trend {
        ObvTrend::Rising if price_change_pct <= -1.0 => ObvDivergence::Bullish,
        ObvTrend::Falling if price_change_pct >= 1.0 => ObvDivergence::Bearish,
        _ => ObvDivergence::None,
    };

    Some(divergence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64, volume: f64) -> Candle {
        Candle {
            open: close,
            high: close,
            low: close,
            close,
            volume,
            trades: 1,
            timestamp: 0,
        }
    }

    #[test]
    fn obv_empty_input() {
        assert!(calculate_obv(&[]).is_empty());
    }

    #[test]
    fn obv_accumulates_on_rising_close() {
        let candles = vec![candle(100.0, 10.0), candle(101.0, 5.0), candle(102.0, 5.0)];
        let obv = calculate_obv(&candles);
        assert_eq!(obv, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn obv_trend_rising() {
        // first half mean = (0+2)/2 = 1, second half mean = (10+15)/2 = 12.5,
        // well past the 10% relative threshold.
        let obv = vec![0.0, 2.0, 10.0, 15.0];
        assert_eq!(obv_trend(&obv, 4), Some(ObvTrend::Rising));
    }

    #[test]
    fn obv_trend_flat_within_threshold() {
        // first half mean = 100, second half mean = 105 -> 5% move, under
        // the 10% relative threshold.
        let obv = vec![99.0, 101.0, 104.0, 106.0];
        assert_eq!(obv_trend(&obv, 4), Some(ObvTrend::Flat));
    }

    #[test]
    fn obv_trend_none_when_lookback_too_small() {
        let obv = vec![0.0, 5.0];
        assert_eq!(obv_trend(&obv, 1), None);
    }

    #[test]
    fn divergence_detected_when_price_falls_but_obv_rises() {
        let candles = vec![candle(100.0, 10.0), candle(99.0, 20.0), candle(98.0, 30.0)];
        let obv = calculate_obv(&candles);
        // closes fall but volume keeps accumulating OBV upward is not
        // possible here since closes fall => OBV falls too. Use a
        // constructed OBV series instead to isolate the comparison.
        let synthetic_obv = vec![0.0, 5.0, 10.0];
        assert_eq!(
            detect_divergence(&candles, &synthetic_obv, 2),
            Some(ObvDivergence::Bullish)
        );
        let _ = obv;
    }

    #[test]
    fn no_divergence_when_aligned() {
        let candles = vec![candle(100.0, 10.0), candle(101.0, 10.0), candle(102.0, 10.0)];
        let obv = calculate_obv(&candles);
        assert_eq!(detect_divergence(&candles, &obv, 2), Some(ObvDivergence::None));
    }
}
