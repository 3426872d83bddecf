// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ). The Band Width (BBW) is the normalised
// distance: BBW = (upper - lower) / middle * 100. BBW is the primary metric
// used by the regime detector and the tradability gate. %B locates the last
// price within the bands: 0 at the lower band, 1 at the upper.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
    /// `(price - lower) / (upper - lower)`. `0.5` when the bands are
    /// degenerate (`upper == lower`), since price is trivially "centered".
    pub percent_b: f64,
}

/// Calculate Bollinger Bands for the given closing prices, evaluated against
/// the most recent close.
///
/// Returns `None` when there are fewer than `period` data points or the
/// middle band is zero (degenerate input).
pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    num_std: f64,
) -> Option<BollingerResult> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let sum: f64 = window.iter().sum();
    let middle = sum / period as f64;

    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let width = (upper - lower) / middle * 100.0;

    if !width.is_finite() {
        return None;
    }

    let price = *closes.last()?;
    let band_range = upper - lower;
    let percent_b = if band_range.abs() < f64::EPSILON {
        0.5
    } else {
        (price - lower) / band_range
    };

    Some(BollingerResult {
        upper,
        middle,
        lower,
        width,
        percent_b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!(bb.width > 0.0);
        assert!((0.0..=1.0).contains(&bb.percent_b));
    }

    #[test]
    fn bollinger_insufficient_data() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
    }

    #[test]
    fn bollinger_flat_percent_b_is_half() {
        let closes = vec![100.0; 20];
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!((bb.width - 0.0).abs() < 1e-10);
        assert!((bb.percent_b - 0.5).abs() < 1e-10);
    }

    #[test]
    fn bollinger_percent_b_at_upper_band() {
        let mut closes = vec![100.0; 19];
        closes.push(200.0);
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.percent_b > 0.9);
    }
}
