// =============================================================================
// IndicatorSnapshot — the per-timeframe bundle the strategy pipeline reasons
// about
// =============================================================================
//
// Ties every indicator in this module together into one value per §3's
// `IndicatorSnapshot` entity: every field is individually nullable if its
// underlying indicator doesn't have enough history, but the composite
// signal is always present once a snapshot exists (a missing sub-indicator
// just contributes 0 to it, per `composite::calculate_composite`).
//
// Candle input follows the aggregator's own convention (newest-first, open
// candle at index 0 if present); this module reverses once internally and
// hands every indicator function an oldest-first slice, matching what each
// of them expects.

use crate::candle::{Candle, Timeframe};
use crate::indicators::adx::{self, AdxResult};
use crate::indicators::atr::{self, AtrLevel};
use crate::indicators::bollinger::{self, BollingerResult};
use crate::indicators::composite::{self, CompositeInputs, CompositeResult};
use crate::indicators::ema::{self, EmaCollection, EmaCrossState, Trend};
use crate::indicators::macd::{self, MacdResult};
use crate::indicators::obv::{self, ObvDivergence, ObvTrend};
use crate::indicators::volume::{self, VolumePressure, VolumeSpike};
use crate::indicators::vwap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RsiReading {
    pub value: f64,
    pub zone: RsiZone,
}

pub fn rsi_zone(value: f64) -> RsiZone {
    if value >= 70.0 {
        RsiZone::Overbought
    } else if value <= 30.0 {
        RsiZone::Oversold
    } else {
        RsiZone::Neutral
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSnapshot {
    pub timeframe: Timeframe,
    pub ts: i64,
    pub price: f64,
    pub emas: EmaCollection,
    pub ema_cross: EmaCrossState,
    pub ema_trend: Trend,
    pub rsi: Option<RsiReading>,
    pub macd: Option<MacdResult>,
    pub bollinger: Option<BollingerResult>,
    pub atr: Option<f64>,
    pub atr_percent: Option<f64>,
    pub atr_level: Option<AtrLevel>,
    pub adx: Option<AdxResult>,
    pub vwap: Option<f64>,
    pub volume_pressure: Option<VolumePressure>,
    pub volume_spike: Option<VolumeSpike>,
    pub volume_momentum: Option<f64>,
    pub obv_trend: Option<ObvTrend>,
    pub obv_divergence: Option<ObvDivergence>,
    pub composite: CompositeResult,
}

const RSI_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const ADX_PERIOD: usize = 14;
const BB_PERIOD: usize = 20;
const BB_STD: f64 = 2.0;
const VOLUME_SPIKE_LOOKBACK: usize = 20;
const VOLUME_MOMENTUM_LOOKBACK: usize = 10;
const OBV_LOOKBACK: usize = 14;

impl IndicatorSnapshot {
    /// `candles` must be newest-first (the aggregator's own convention),
    /// with the currently open candle (if any) at index 0. `None` if
    /// `candles` is empty.
    pub fn compute(timeframe: Timeframe, candles: &[Candle]) -> Option<Self> {
        if candles.is_empty() {
            return None;
        }

        let mut oldest_first: Vec<Candle> = candles.to_vec();
        oldest_first.reverse();

        let closes: Vec<f64> = oldest_first.iter().map(|c| c.close).collect();
        let price = *closes.last()?;
        let ts = oldest_first.last()?.timestamp;

        let emas = EmaCollection::compute(&closes);
        let ema_cross = EmaCrossState::compute(&emas);
        let ema_trend = ema::classify_trend(&emas, price);

        let rsi = crate::indicators::rsi::current_rsi(&closes, RSI_PERIOD)
            .map(|(value, _)| RsiReading { value, zone: rsi_zone(value) });
        let macd = macd::calculate_macd(&closes);
        let bollinger = bollinger::calculate_bollinger(&closes, BB_PERIOD, BB_STD);

        let atr = atr::calculate_atr(&oldest_first, ATR_PERIOD);
        let atr_percent = atr::calculate_atr_pct(&oldest_first, ATR_PERIOD);
        let atr_level = atr_percent.map(atr::atr_level);

        let adx = adx::calculate_adx(&oldest_first, ADX_PERIOD);

        let vwap_value = vwap::calculate_vwap(&oldest_first);
        let volume_pressure = volume::calculate_volume_pressure(&oldest_first);
        let volume_spike = volume::detect_volume_spike(&oldest_first, VOLUME_SPIKE_LOOKBACK);
        let volume_momentum = {
            let len = oldest_first.len();
            let window = if len > VOLUME_MOMENTUM_LOOKBACK {
                &oldest_first[len - VOLUME_MOMENTUM_LOOKBACK..]
            } else {
                &oldest_first[..]
            };
            volume::calculate_volume_weighted_momentum(window)
        };

        let obv_series = obv::calculate_obv(&oldest_first);
        let obv_trend_value = obv::obv_trend(&obv_series, OBV_LOOKBACK);
        let obv_divergence = obv::detect_divergence(&oldest_first, &obv_series, OBV_LOOKBACK);

        let composite_inputs = CompositeInputs {
            price,
            rsi: rsi.map(|r| r.value),
            macd,
            ema_trend,
            ema21: emas.ema21,
            bollinger,
            vwap: vwap_value,
            volume_pressure,
            volume_momentum,
            obv_divergence,
        };
        let composite = composite::calculate_composite(&composite_inputs);

        Some(Self {
            timeframe,
            ts,
            price,
            emas,
            ema_cross,
            ema_trend,
            rsi,
            macd,
            bollinger,
            atr,
            atr_percent,
            atr_level,
            adx,
            vwap: vwap_value,
            volume_pressure,
            volume_spike,
            volume_momentum,
            obv_trend: obv_trend_value,
            obv_divergence,
            composite,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(i: usize, base: f64) -> Candle {
        Candle {
            open: base,
            high: base + 1.0,
            low: base - 1.0,
            close: base,
            volume: 10.0 + (i % 5) as f64,
            trades: 1,
            timestamp: i as i64 * 60_000,
        }
    }

    #[test]
    fn empty_candles_yield_none() {
        assert!(IndicatorSnapshot::compute(Timeframe::M1, &[]).is_none());
    }

    #[test]
    fn sparse_history_still_yields_a_snapshot_with_nulls() {
        let candles = vec![candle(0, 100.0), candle(1, 101.0)];
        // caller convention is newest-first
        let newest_first: Vec<Candle> = candles.into_iter().rev().collect();
        let snap = IndicatorSnapshot::compute(Timeframe::M1, &newest_first).unwrap();
        assert!(snap.rsi.is_none());
        assert!(snap.adx.is_none());
        // composite is always present even with almost everything missing
        assert_eq!(snap.composite.components.rsi, None);
    }

    #[test]
    fn rich_history_populates_every_field() {
        let oldest_first: Vec<Candle> = (0..250).map(|i| candle(i, 100.0 + i as f64 * 0.1)).collect();
        let newest_first: Vec<Candle> = oldest_first.into_iter().rev().collect();
        let snap = IndicatorSnapshot::compute(Timeframe::M15, &newest_first).unwrap();
        assert!(snap.rsi.is_some());
        assert!(snap.macd.is_some());
        assert!(snap.bollinger.is_some());
        assert!(snap.atr.is_some());
        assert!(snap.adx.is_some());
        assert!(snap.vwap.is_some());
        assert!(snap.volume_pressure.is_some());
    }
}
