// =============================================================================
// Tradability Gate, Throttle and Entry Confirmation
// =============================================================================
//
// Three independent guards the pipeline runs before it lets an entry signal
// stand. `Tradability` and `EntryConfirmation` are pure functions over an
// already-computed `IndicatorSnapshot`; `Throttle` is the one gate with its
// own state, mirroring `RiskEngine`'s `RwLock<Inner>` + ordered-checks shape
// from `risk.rs`, but scoped to exactly the four checks named below — there
// is no daily-loss or drawdown breaker here, that belongs to the execution
// venue.

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::indicators::atr::AtrLevel;
use crate::indicators::ema::Trend;
use crate::indicators::snapshot::IndicatorSnapshot;
use crate::types::{Direction, ExitReason, Outcome};

// -----------------------------------------------------------------------------
// Tradability Gate (15-minute snapshot)
// -----------------------------------------------------------------------------

const ATR_PCT_MIN: f64 = 0.15;
const ATR_PCT_MAX: f64 = 2.0;
const ADX_TREND_MIN: f64 = 18.0;
const BB_COMPRESSION_MIN_WIDTH: f64 = 0.8;

#[derive(Debug, Clone, Serialize)]
pub struct TradabilityResult {
    pub tradable: bool,
    pub reason: Option<String>,
}

pub struct Tradability;

impl Tradability {
    /// Evaluate against the 15-minute snapshot. Volatility must pass; beyond
    /// that either the trend check or the (weak-trend + compression) check
    /// must pass. Missing ATR or ADX data fails its own check; missing
    /// Bollinger data is never fatal.
    pub fn evaluate(snapshot: &IndicatorSnapshot) -> TradabilityResult {
        let volatility_ok = match snapshot.atr_percent {
            Some(pct) if pct < ATR_PCT_MIN => {
                return TradabilityResult {
                    tradable: false,
                    reason: Some(format!("volatility too low: ATR% {:.3} < {:.2}", pct, ATR_PCT_MIN)),
                };
            }
            Some(pct) if pct > ATR_PCT_MAX => {
                return TradabilityResult {
                    tradable: false,
                    reason: Some(format!("volatility too extreme: ATR% {:.3} > {:.2}", pct, ATR_PCT_MAX)),
                };
            }
            Some(_) => true,
            None => {
                return TradabilityResult {
                    tradable: false,
                    reason: Some("no ATR data available".to_string()),
                };
            }
        };

        let trend_ok = match snapshot.adx {
            Some(adx) => adx.adx >= ADX_TREND_MIN,
            None => {
                return TradabilityResult {
                    tradable: false,
                    reason: Some("no ADX data available".to_string()),
                };
            }
        };

        if volatility_ok && trend_ok {
            return TradabilityResult { tradable: true, reason: None };
        }

        let compression_ok = snapshot
            .bollinger
            .map(|bb| bb.width > BB_COMPRESSION_MIN_WIDTH)
            .unwrap_or(false);

        if volatility_ok && !trend_ok && compression_ok {
            return TradabilityResult { tradable: true, reason: None };
        }

        TradabilityResult {
            tradable: false,
            reason: Some(format!(
                "weak trend (ADX {:.1} < {:.1}) and no compression to compensate",
                snapshot.adx.map(|a| a.adx).unwrap_or(0.0),
                ADX_TREND_MIN
            )),
        }
    }
}

// -----------------------------------------------------------------------------
// Throttle
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ThrottleConfig {
    pub stop_loss_cooldown_ms: i64,
    pub min_trading_gap_ms: i64,
    pub max_trades_per_hour: u32,
    pub max_consecutive_losses: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            stop_loss_cooldown_ms: 300_000,
            min_trading_gap_ms: 120_000,
            max_trades_per_hour: 3,
            max_consecutive_losses: 3,
        }
    }
}

const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Default)]
struct ThrottleInner {
    trade_times_ms: Vec<i64>,
    consecutive_losses: u32,
    last_trade_time_ms: Option<i64>,
    last_stop_loss_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThrottleResult {
    pub allowed: bool,
    pub reason: Option<String>,
    pub cooldown_remaining_ms: i64,
}

impl ThrottleResult {
    fn allow() -> Self {
        Self { allowed: true, reason: None, cooldown_remaining_ms: 0 }
    }

    fn block(reason: String, cooldown_remaining_ms: i64) -> Self {
        Self { allowed: false, reason: Some(reason), cooldown_remaining_ms: cooldown_remaining_ms.max(0) }
    }
}

/// Process-wide trade-rate guard. The crate's only circuit breaker.
pub struct Throttle {
    config: ThrottleConfig,
    state: RwLock<ThrottleInner>,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { config, state: RwLock::new(ThrottleInner::default()) }
    }

    /// Ordered checks: stop-loss cooldown, minimum trading gap,
    /// consecutive-loss pause, rolling max-trades-per-hour.
    pub fn check(&self, now_ms: i64) -> ThrottleResult {
        let s = self.state.read();

        if let Some(last_sl) = s.last_stop_loss_time_ms {
            let elapsed = now_ms - last_sl;
            if elapsed < self.config.stop_loss_cooldown_ms {
                let remaining = self.config.stop_loss_cooldown_ms - elapsed;
                return ThrottleResult::block(
                    format!("stop-loss cooldown active, {remaining}ms remaining"),
                    remaining,
                );
            }
        }

        if let Some(last_trade) = s.last_trade_time_ms {
            let elapsed = now_ms - last_trade;
            if elapsed < self.config.min_trading_gap_ms {
                let remaining = self.config.min_trading_gap_ms - elapsed;
                return ThrottleResult::block(
                    format!("minimum trading gap not elapsed, {remaining}ms remaining"),
                    remaining,
                );
            }
        }

        if s.consecutive_losses >= self.config.max_consecutive_losses {
            return ThrottleResult::block(
                format!("{} consecutive losses, pausing", s.consecutive_losses),
                0,
            );
        }

        let window_start = now_ms - HOUR_MS;
        let trades_in_window = s.trade_times_ms.iter().filter(|&&t| t > window_start).count() as u32;
        if trades_in_window >= self.config.max_trades_per_hour {
            return ThrottleResult::block(
                format!(
                    "{trades_in_window} trades in the last hour >= limit {}",
                    self.config.max_trades_per_hour
                ),
                0,
            );
        }

        ThrottleResult::allow()
    }

    /// Record a closed trade: appends to the rolling window, updates the
    /// consecutive-loss counter (win/breakeven resets it, loss increments
    /// it), and latches the stop-loss cooldown when the exit reason is
    /// `STOP_LOSS`.
    pub fn record_trade(&self, outcome: Outcome, exit_reason: ExitReason, now_ms: i64) {
        let mut s = self.state.write();

        s.trade_times_ms.retain(|&t| t > now_ms - HOUR_MS);
        s.trade_times_ms.push(now_ms);
        s.last_trade_time_ms = Some(now_ms);

        match outcome {
            Outcome::Loss => s.consecutive_losses += 1,
            Outcome::Win | Outcome::Breakeven => s.consecutive_losses = 0,
        }

        if exit_reason == ExitReason::StopLoss {
            s.last_stop_loss_time_ms = Some(now_ms);
        }

        debug!(
            ?outcome,
            ?exit_reason,
            consecutive_losses = s.consecutive_losses,
            trades_in_window = s.trade_times_ms.len(),
            "throttle recorded trade"
        );
    }

    pub fn reset(&self) {
        *self.state.write() = ThrottleInner::default();
    }
}

// -----------------------------------------------------------------------------
// Entry Confirmation (1-minute snapshot)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct EntryConfirmationResult {
    pub confirmed: bool,
    pub reason: Option<String>,
}

pub struct EntryConfirmation;

impl EntryConfirmation {
    /// Three sub-checks (range, momentum, exhaustion) against the 1-minute
    /// snapshot for a candidate `direction`. Missing data always passes.
    pub fn evaluate(snapshot: &IndicatorSnapshot, direction: Direction) -> EntryConfirmationResult {
        if let Some(level) = snapshot.atr_level {
            if level == AtrLevel::Extreme {
                return EntryConfirmationResult {
                    confirmed: false,
                    reason: Some("1m ATR level is extreme".to_string()),
                };
            }
            if level == AtrLevel::High {
                if let Some(pct) = snapshot.atr_percent {
                    if pct > 1.5 {
                        return EntryConfirmationResult {
                            confirmed: false,
                            reason: Some(format!("1m ATR% {pct:.3} > 1.5 at high level")),
                        };
                    }
                }
            }
        }

        match direction {
            Direction::Long => {
                if snapshot.ema_trend == Trend::StrongBearish {
                    return EntryConfirmationResult {
                        confirmed: false,
                        reason: Some("1m EMA trend is strong_bearish against LONG".to_string()),
                    };
                }
                if let Some(macd) = snapshot.macd {
                    if macd.histogram < -0.5 {
                        return EntryConfirmationResult {
                            confirmed: false,
                            reason: Some(format!("1m MACD histogram {:.3} < -0.5 against LONG", macd.histogram)),
                        };
                    }
                }
                if let Some(rsi) = snapshot.rsi {
                    if rsi.value > 80.0 {
                        return EntryConfirmationResult {
                            confirmed: false,
                            reason: Some(format!("1m RSI {:.1} > 80, exhausted for LONG", rsi.value)),
                        };
                    }
                }
            }
            Direction::Short => {
                if snapshot.ema_trend == Trend::StrongBullish {
                    return EntryConfirmationResult {
                        confirmed: false,
                        reason: Some("1m EMA trend is strong_bullish against SHORT".to_string()),
                    };
                }
                if let Some(macd) = snapshot.macd {
                    if macd.histogram > 0.5 {
                        return EntryConfirmationResult {
                            confirmed: false,
                            reason: Some(format!("1m MACD histogram {:.3} > 0.5 against SHORT", macd.histogram)),
                        };
                    }
                }
                if let Some(rsi) = snapshot.rsi {
                    if rsi.value < 20.0 {
                        return EntryConfirmationResult {
                            confirmed: false,
                            reason: Some(format!("1m RSI {:.1} < 20, exhausted for SHORT", rsi.value)),
                        };
                    }
                }
            }
        }

        EntryConfirmationResult { confirmed: true, reason: None }
    }
}
