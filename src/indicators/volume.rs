// =============================================================================
// Volume-derived signals: pressure, spikes, weighted momentum
// =============================================================================
//
// New — no teacher file reasons about volume pressure or spikes directly,
// but the "borrow a candle slice, return `Option`, never panic" shape
// matches every other indicator in this module.

use crate::candle::Candle;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureDirection {
    Buying,
    Selling,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VolumePressure {
    pub direction: PressureDirection,
    /// Up-volume / total-volume across the window, in [0, 1].
    pub ratio: f64,
}

/// Per-candle buy/sell volume split: `buyShare = (close-low)/range`,
/// `sellShare = (high-close)/range`, each candle's volume apportioned by its
/// share; a zero-range candle (high == low) splits its volume 50/50.
/// Aggregate buy-volume / total-volume over the window classifies which
/// side dominates: `> 0.55` buyers, `< 0.45` sellers, else neutral. `None`
/// if the window is empty or carries zero total volume.
pub fn calculate_volume_pressure(candles: &[Candle]) -> Option<VolumePressure> {
    if candles.is_empty() {
        return None;
    }

    let mut buy_vol = 0.0;
    let mut total_vol = 0.0;
    for c in candles {
        let range = c.high - c.low;
        let buy_share = if range > 0.0 {
            (c.close - c.low) / range
        } else {
            0.5
        };
        buy_vol += buy_share * c.volume;
        total_vol += c.volume;
    }

    if total_vol <= 0.0 {
        return None;
    }

    let ratio = buy_vol / total_vol;
    let direction = if ratio > 0.55 {
        PressureDirection::Buying
    } else if ratio < 0.45 {
        PressureDirection::Selling
    } else {
        PressureDirection::Neutral
    };

    Some(VolumePressure { direction, ratio })
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VolumeSpike {
    pub is_spike: bool,
    /// Current candle's volume divided by the average of the preceding
    /// window.
    pub ratio: f64,
}

/// Compare the most recent candle's volume against the average of the
/// `lookback` candles before it. A spike is declared at 2x average volume.
/// `None` if there are fewer than `lookback + 1` candles or the average is
/// zero.
pub fn detect_volume_spike(candles: &[Candle], lookback: usize) -> Option<VolumeSpike> {
    if lookback == 0 || candles.len() < lookback + 1 {
        return None;
    }

    let current = candles.last()?.volume;
    let window = &candles[candles.len() - lookback - 1..candles.len() - 1];
    let avg: f64 = window.iter().map(|c| c.volume).sum::<f64>() / lookback as f64;

    if avg <= 0.0 {
        return None;
    }

    let ratio = current / avg;
    Some(VolumeSpike {
        is_spike: ratio >= 2.0,
        ratio,
    })
}

/// Sum of `(close - open) * volume` across the window, normalised by total
/// volume — momentum that weighs big-volume bars more heavily than thin
/// ones. `None` if the window is empty or carries zero total volume.
pub fn calculate_volume_weighted_momentum(candles: &[Candle]) -> Option<f64> {
    if candles.is_empty() {
        return None;
    }

    let mut weighted_sum = 0.0;
    let mut total_vol = 0.0;
    for c in candles {
        weighted_sum += (c.close - c.open) * c.volume;
        total_vol += c.volume;
    }

    if total_vol <= 0.0 {
        return None;
    }

    let momentum = weighted_sum / total_vol;
    momentum.is_finite().then_some(momentum)
}
