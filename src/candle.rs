// =============================================================================
// Candle Aggregator — multi-timeframe OHLCV from a single price tick stream
// =============================================================================
//
// Turns an ordered `(price, ts_ms)` tick stream into eight parallel
// timeframes of OHLCV candles. The ring-buffer-per-key shape (a lock guarding
// a map of bounded `VecDeque`s, trimmed to capacity on every write) follows
// `market_data/candle_buffer.rs`'s `CandleBuffer`; unlike that Binance-kline
// consumer, ingestion here is a plain price tick — the exchange/RPC client
// that produces those ticks is an external collaborator (see module docs),
// not part of this core.
//
// Volume here is synthetic: one unit of volume/trade-count is added to the
// open candle of every timeframe whenever the incoming price differs from
// the previous tick's price. This is not exchange-reported volume. It is
// kept deliberately — see `Timeframe::PERIOD_MS` below and `Stats` — rather
// than silently repaired into something it isn't.
// =============================================================================

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One OHLCV bar. `timestamp` is the period-start in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trades: u64,
    pub timestamp: i64,
}

impl Candle {
    fn new(price: f64, period_start: i64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
            trades: 0,
            timestamp: period_start,
        }
    }

    fn apply_tick(&mut self, price: f64, price_changed: bool) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        if price_changed {
            self.volume += 1.0;
            self.trades += 1;
        }
    }

    /// `low <= open,close <= high`, as required of every closed candle.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
            && self.volume >= 0.0
    }
}

/// The eight supported timeframes, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    S1,
    M1,
    M2,
    M5,
    M10,
    M15,
    M30,
    H1,
}

pub const ALL_TIMEFRAMES: [Timeframe; 8] = [
    Timeframe::S1,
    Timeframe::M1,
    Timeframe::M2,
    Timeframe::M5,
    Timeframe::M10,
    Timeframe::M15,
    Timeframe::M30,
    Timeframe::H1,
];

impl Timeframe {
    pub fn period_ms(self) -> i64 {
        match self {
            Self::S1 => 1_000,
            Self::M1 => 60_000,
            Self::M2 => 120_000,
            Self::M5 => 300_000,
            Self::M10 => 600_000,
            Self::M15 => 900_000,
            Self::M30 => 1_800_000,
            Self::H1 => 3_600_000,
        }
    }

    pub fn capacity(self) -> usize {
        match self {
            Self::S1 => 120,
            Self::M1 | Self::M2 | Self::M5 => 100,
            Self::M10 | Self::M15 | Self::M30 | Self::H1 => 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::S1 => "1s",
            Self::M1 => "1m",
            Self::M2 => "2m",
            Self::M5 => "5m",
            Self::M10 => "10m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
        }
    }

    fn period_start(self, ts_ms: i64) -> i64 {
        let period = self.period_ms();
        (ts_ms.div_euclid(period)) * period
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Newest-first closed-candle ring plus the currently open candle, for one
/// timeframe.
#[derive(Debug, Default)]
struct Ring {
    closed: VecDeque<Candle>,
    open: Option<Candle>,
}

impl Ring {
    fn push_closed(&mut self, candle: Candle, capacity: usize) {
        self.closed.push_front(candle);
        while self.closed.len() > capacity {
            self.closed.pop_back();
        }
    }
}

/// Lightweight counters surfaced for operators — not part of the decision
/// logic itself.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Stats {
    pub ticks_processed: u64,
    pub malformed_ticks: u64,
    /// Always `true`: a reminder to API consumers that volume here is a
    /// synthetic per-tick counter, not exchange-reported volume.
    pub synthetic_volume: bool,
}

struct Inner {
    rings: std::collections::HashMap<Timeframe, Ring>,
    last_price: f64,
    stats: Stats,
}

impl Default for Inner {
    fn default() -> Self {
        let mut rings = std::collections::HashMap::new();
        for tf in ALL_TIMEFRAMES {
            rings.insert(tf, Ring::default());
        }
        Self {
            rings,
            last_price: 0.0,
            stats: Stats {
                synthetic_volume: true,
                ..Default::default()
            },
        }
    }
}

/// Process-singleton candle aggregator. One coarse lock guards all eight
/// rings; readers copy out what they need and release the lock before doing
/// any indicator math (spec §5).
pub struct CandleAggregator {
    inner: RwLock<Inner>,
}

impl Default for CandleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleAggregator {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Ingest one authoritative price tick. O(#timeframes). Non-positive
    /// prices are dropped silently (counted in `stats()`), per spec §4.1.
    pub fn update(&self, price: f64, ts_ms: i64) {
        if !(price > 0.0) || !price.is_finite() {
            let mut inner = self.inner.write();
            inner.stats.malformed_ticks += 1;
            return;
        }

        let mut inner = self.inner.write();
        let price_changed = inner.last_price != price;
        inner.last_price = price;
        inner.stats.ticks_processed += 1;

        for tf in ALL_TIMEFRAMES {
            let period_start = tf.period_start(ts_ms);
            let capacity = tf.capacity();
            let ring = inner.rings.get_mut(&tf).expect("all timeframes seeded");

            let needs_new_period = match &ring.open {
                Some(open) => open.timestamp != period_start,
                None => true,
            };

            if needs_new_period {
                if let Some(frozen) = ring.open.take() {
                    ring.push_closed(frozen, capacity);
                }
                ring.open = Some(Candle::new(price, period_start));
            }

            if let Some(open) = ring.open.as_mut() {
                open.apply_tick(price, price_changed);
            }
        }
    }

    /// Up to `limit` candles, newest-first, with the open candle (if any) at
    /// position 0.
    pub fn candles(&self, tf: Timeframe, limit: usize) -> Vec<Candle> {
        let inner = self.inner.read();
        let Some(ring) = inner.rings.get(&tf) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(limit.min(ring.closed.len() + 1));
        if let Some(open) = ring.open {
            out.push(open);
        }
        for c in ring.closed.iter() {
            if out.len() >= limit {
                break;
            }
            out.push(*c);
        }
        out
    }

    pub fn current_candle(&self, tf: Timeframe) -> Option<Candle> {
        self.inner.read().rings.get(&tf).and_then(|r| r.open)
    }

    pub fn last_price(&self) -> f64 {
        self.inner.read().last_price
    }

    pub fn stats(&self) -> Stats {
        self.inner.read().stats
    }

    /// Percentage change from the oldest retained closed candle's close to
    /// the last observed price, for the given timeframe. `None` if there is
    /// no closed history yet.
    pub fn price_change(&self, tf: Timeframe) -> Option<f64> {
        let inner = self.inner.read();
        let ring = inner.rings.get(&tf)?;
        let oldest = ring.closed.back()?;
        if oldest.close == 0.0 {
            return None;
        }
        Some((inner.last_price - oldest.close) / oldest.close * 100.0)
    }

    /// Wipe all state. Used by tests and on engine restart.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        *inner = Inner::default();
    }

    /// Seed a timeframe's closed-candle ring from history. `candles` must
    /// already be newest-first; only the newest `capacity(tf)` are kept. The
    /// currently open candle (if any) is left untouched — seeding never
    /// forges an "open" bar.
    pub fn load_historical(&self, tf: Timeframe, candles: &[Candle]) {
        let mut inner = self.inner.write();
        let capacity = tf.capacity();
        {
            let ring = inner.rings.entry(tf).or_default();
            ring.closed = candles.iter().take(capacity).copied().collect();
        }
        if inner.last_price == 0.0 {
            if let Some(newest) = candles.first() {
                inner.last_price = newest.close;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregator_boundary_tick() {
        let agg = CandleAggregator::new();
        agg.update(100.0, 0);
        agg.update(101.0, 59_999);
        agg.update(102.0, 60_000);

        let candles = agg.candles(Timeframe::M1, 10);
        // index 0 is the newly opened candle at ts=60_000, index 1 the
        // frozen candle covering [0, 60_000).
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 60_000);
        assert_eq!(candles[0].open, 102.0);
        assert_eq!(candles[1].timestamp, 0);
        assert_eq!(candles[1].open, 100.0);
        assert_eq!(candles[1].high, 101.0);
        assert_eq!(candles[1].low, 100.0);
        assert_eq!(candles[1].close, 101.0);
        assert_eq!(agg.last_price(), 102.0);
    }

    #[test]
    fn non_positive_price_dropped() {
        let agg = CandleAggregator::new();
        agg.update(-5.0, 0);
        agg.update(0.0, 0);
        assert_eq!(agg.last_price(), 0.0);
        assert_eq!(agg.stats().malformed_ticks, 2);
    }

    #[test]
    fn unchanged_price_adds_no_volume() {
        let agg = CandleAggregator::new();
        agg.update(100.0, 0);
        agg.update(100.0, 1);
        agg.update(100.0, 2);
        let open = agg.current_candle(Timeframe::S1).unwrap();
        // First tick always counts as "changed" from the initial 0.0 last
        // price; the next two repeats at the same price add nothing.
        assert_eq!(open.trades, 1);
        assert_eq!(open.volume, 1.0);
    }

    #[test]
    fn ring_respects_capacity() {
        let agg = CandleAggregator::new();
        for i in 0..200i64 {
            agg.update(100.0 + i as f64, i * 1_000);
        }
        let candles = agg.candles(Timeframe::S1, 1_000);
        assert!(candles.len() <= Timeframe::S1.capacity() + 1);
    }

    #[test]
    fn load_historical_seeds_and_is_capacity_truncated() {
        let agg = CandleAggregator::new();
        let seed: Vec<Candle> = (0..150)
            .map(|i| Candle {
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 200.0 - i as f64,
                volume: 0.0,
                trades: 0,
                timestamp: (149 - i) * 60_000,
            })
            .collect();
        agg.load_historical(Timeframe::M1, &seed);
        let candles = agg.candles(Timeframe::M1, 1_000);
        assert_eq!(candles.len(), Timeframe::M1.capacity());
        assert_eq!(candles[0], seed[0]);
        assert_eq!(agg.last_price(), seed[0].close);
    }

    #[test]
    fn reset_clears_state() {
        let agg = CandleAggregator::new();
        agg.update(100.0, 0);
        agg.reset();
        assert_eq!(agg.last_price(), 0.0);
        assert!(agg.candles(Timeframe::M1, 10).is_empty());
    }
}
