// =============================================================================
// Average Directional Index (ADX) with +DI/-DI
// =============================================================================
//
// ADX quantifies trend **strength** regardless of direction; +DI/-DI (kept
// internal to `compute_dx` originally) are exposed here since the regime
// detector and entry confirmation need *which* side is driving the trend,
// not just how strong it is.
//
// Calculation pipeline:
//   1. Compute +DM (positive directional movement) and -DM per bar.
//   2. Compute True Range (TR) per bar.
//   3. Apply Wilder's smoothing (period) to +DM, -DM, and TR.
//   4. Derive +DI = smoothed(+DM) / smoothed(TR) * 100
//            -DI = smoothed(-DM) / smoothed(TR) * 100
//   5. DX  = |+DI - -DI| / (+DI + -DI) * 100
//   6. ADX = Wilder's smoothed average of DX over `period` bars.
// =============================================================================

use crate::candle::Candle;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdxResult {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub strength: AdxStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdxStrength {
    None,
    Weak,
    Moderate,
    Strong,
    Extreme,
}

fn classify_strength(adx: f64) -> AdxStrength {
    if adx < 20.0 {
        AdxStrength::None
    } else if adx < 25.0 {
        AdxStrength::Weak
    } else if adx < 35.0 {
        AdxStrength::Moderate
    } else if adx < 50.0 {
        AdxStrength::Strong
    } else {
        AdxStrength::Extreme
    }
}

/// Compute ADX plus the +DI/-DI pair driving its most recent value, from a
/// slice of OHLCV candles (oldest first).
///
/// Returns `None` when `period` is zero, there are fewer than `2 * period +
/// 1` candles, or any intermediate calculation produces a non-finite result.
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<AdxResult> {
    if period == 0 {
        return None;
    }

    let min_candles = 2 * period + 1;
    if candles.len() < min_candles {
        return None;
    }

    let period_f = period as f64;
    let n = candles.len();
    let bar_count = n - 1;

    let mut plus_dm = Vec::with_capacity(bar_count);
    let mut minus_dm = Vec::with_capacity(bar_count);
    let mut tr_vals = Vec::with_capacity(bar_count);

    for i in 1..n {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_high = candles[i - 1].high;
        let prev_low = candles[i - 1].low;
        let prev_close = candles[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        let up_move = high - prev_high;
        let down_move = prev_low - low;

        let pdm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let mdm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        plus_dm.push(pdm);
        minus_dm.push(mdm);
        tr_vals.push(tr);
    }

    let mut smooth_plus_dm: f64 = plus_dm[..period].iter().sum();
    let mut smooth_minus_dm: f64 = minus_dm[..period].iter().sum();
    let mut smooth_tr: f64 = tr_vals[..period].iter().sum();

    let mut dx_values: Vec<f64> = Vec::with_capacity(bar_count - period + 1);
    let mut di_pairs: Vec<(f64, f64)> = Vec::with_capacity(bar_count - period + 1);

    let (dx, plus_di, minus_di) = compute_dx(smooth_plus_dm, smooth_minus_dm, smooth_tr)?;
    dx_values.push(dx);
    di_pairs.push((plus_di, minus_di));

    for i in period..bar_count {
        smooth_plus_dm = smooth_plus_dm - smooth_plus_dm / period_f + plus_dm[i];
        smooth_minus_dm = smooth_minus_dm - smooth_minus_dm / period_f + minus_dm[i];
        smooth_tr = smooth_tr - smooth_tr / period_f + tr_vals[i];

        let (dx, plus_di, minus_di) = compute_dx(smooth_plus_dm, smooth_minus_dm, smooth_tr)?;
        dx_values.push(dx);
        di_pairs.push((plus_di, minus_di));
    }

    if dx_values.len() < period {
        return None;
    }

    let adx_seed: f64 = dx_values[..period].iter().sum::<f64>() / period_f;
    if !adx_seed.is_finite() {
        return None;
    }

    let mut adx = adx_seed;
    for &dx in &dx_values[period..] {
        adx = (adx * (period_f - 1.0) + dx) / period_f;
        if !adx.is_finite() {
            return None;
        }
    }

    let (plus_di, minus_di) = *di_pairs.last()?;

    Some(AdxResult {
        adx,
        plus_di,
        minus_di,
        strength: classify_strength(adx),
    })
}

/// DX plus the +DI/-DI pair it was derived from. `None` if the TR divisor is
/// zero or the result is non-finite.
fn compute_dx(smooth_plus_dm: f64, smooth_minus_dm: f64, smooth_tr: f64) -> Option<(f64, f64, f64)> {
    if smooth_tr == 0.0 {
        return None;
    }

    let plus_di = (smooth_plus_dm / smooth_tr) * 100.0;
    let minus_di = (smooth_minus_dm / smooth_tr) * 100.0;

    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return Some((0.0, plus_di, minus_di));
    }

    let dx = ((plus_di - minus_di).abs() / di_sum) * 100.0;

    if dx.is_finite() {
        Some((dx, plus_di, minus_di))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open,
            high,
            low,
            close,
            volume: 1.0,
            trades: 1,
            timestamp: 0,
        }
    }

    #[test]
    fn adx_period_zero() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5); 50];
        assert!(calculate_adx(&candles, 0).is_none());
    }

    #[test]
    fn adx_insufficient_data() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5); 10];
        assert!(calculate_adx(&candles, 14).is_none());
    }

    #[test]
    fn adx_strong_uptrend_has_dominant_plus_di() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                candle(base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect();

        let result = calculate_adx(&candles, 14).unwrap();
        assert!(result.adx > 25.0, "expected ADX > 25, got {}", result.adx);
        assert!(result.plus_di > result.minus_di);
        assert!(matches!(
            result.strength,
            AdxStrength::Strong | AdxStrength::Extreme
        ));
    }

    #[test]
    fn adx_flat_market() {
        let candles = vec![candle(100.0, 101.0, 99.0, 100.0); 60];
        let result = calculate_adx(&candles, 14).unwrap();
        assert!(result.adx < 1.0, "expected ADX near 0, got {}", result.adx);
        assert_eq!(result.strength, AdxStrength::None);
    }

    #[test]
    fn adx_result_range() {
        let candles: Vec<Candle> = (0..100)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                candle(base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        if let Some(result) = calculate_adx(&candles, 14) {
            assert!((0.0..=100.0).contains(&result.adx));
            assert!(result.plus_di >= 0.0);
            assert!(result.minus_di >= 0.0);
        }
    }

    #[test]
    fn adx_minimum_candles_exact() {
        let period = 5;
        let min = 2 * period + 1;
        let candles: Vec<Candle> = (0..min)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 1.0, base - 0.5, base + 0.5)
            })
            .collect();
        assert!(calculate_adx(&candles, period).is_some());
        assert!(calculate_adx(&candles[..min - 1], period).is_none());
    }
}
