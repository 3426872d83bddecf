// =============================================================================
// Volume Weighted Average Price
// =============================================================================
//
// New — no teacher file computes VWAP, but the shape (fold over a borrowed
// candle slice, `None` on empty/zero-volume input) matches the rest of this
// module.

use crate::candle::Candle;

/// Typical-price VWAP over the given candles: `sum(((h+l+c)/3) * v) /
/// sum(v)`. If every candle carries zero volume, degrades to the plain
/// arithmetic mean of typical prices rather than failing outright (spec
/// §4.2). `None` only if `candles` is empty.
pub fn calculate_vwap(candles: &[Candle]) -> Option<f64> {
    if candles.is_empty() {
        return None;
    }

    let mut pv_sum = 0.0;
    let mut v_sum = 0.0;
    let mut typical_sum = 0.0;
    for c in candles {
        let typical = (c.high + c.low + c.close) / 3.0;
        pv_sum += typical * c.volume;
        v_sum += c.volume;
        typical_sum += typical;
    }

    let vwap = if v_sum > 0.0 {
        pv_sum / v_sum
    } else {
        typical_sum / candles.len() as f64
    };
    vwap.is_finite().then_some(vwap)
}

/// Percentage distance of `price` above (positive) or below (negative) VWAP.
pub fn vwap_deviation_pct(price: f64, vwap: f64) -> Option<f64> {
    if vwap == 0.0 {
        return None;
    }
    Some((price - vwap) / vwap * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(h: f64, l: f64, c: f64, v: f64) -> Candle {
        Candle {
            open: c,
            high: h,
            low: l,
            close: c,
            volume: v,
            trades: 1,
            timestamp: 0,
        }
    }

    #[test]
    fn vwap_empty_is_none() {
        assert!(calculate_vwap(&[]).is_none());
    }

    #[test]
    fn vwap_zero_volume_degrades_to_typical_price_mean() {
        let candles = vec![candle(101.0, 99.0, 100.0, 0.0); 5];
        let vwap = calculate_vwap(&candles).unwrap();
        assert!((vwap - 100.0).abs() < 1e-10);
    }

    #[test]
    fn vwap_weights_by_volume() {
        let candles = vec![
            candle(101.0, 99.0, 100.0, 1.0),
            candle(201.0, 199.0, 200.0, 9.0),
        ];
        let vwap = calculate_vwap(&candles).unwrap();
        // Heavily weighted toward the second candle's ~200 typical price.
        assert!(vwap > 180.0 && vwap < 200.0);
    }

    #[test]
    fn vwap_deviation_sign() {
        assert!(vwap_deviation_pct(110.0, 100.0).unwrap() > 0.0);
        assert!(vwap_deviation_pct(90.0, 100.0).unwrap() < 0.0);
    }
}
