// =============================================================================
// Shared types used across the decision core
// =============================================================================

use serde::{Deserialize, Serialize};

/// Balance snapshot for a single asset, reported by the (external) account
/// collaborator — carried for the dashboard snapshot, not touched by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub asset: String,
    #[serde(default)]
    pub free: f64,
    #[serde(default)]
    pub locked: f64,
}

/// Whether the engine is actively trading, paused, or killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    Live,
    Paused,
    Killed,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::Paused
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "Live"),
            Self::Paused => write!(f, "Paused"),
            Self::Killed => write!(f, "Killed"),
        }
    }
}

/// Whether we are running against real funds or simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountMode {
    Demo,
    Live,
}

impl Default for AccountMode {
    fn default() -> Self {
        Self::Demo
    }
}

impl std::fmt::Display for AccountMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Demo => write!(f, "Demo"),
            Self::Live => write!(f, "Live"),
        }
    }
}

/// Trade direction. Mirrors `Side` in the order-flow collaborator but the
/// core only ever reasons about LONG/SHORT, never flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for LONG, -1 for SHORT — convenient for direction-aware arithmetic.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Directional recommendation out of the entry signal generator, including
/// the "no trade" case — deliberately distinct from `Direction`, which never
/// admits a flat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Long,
    Short,
    None,
}

impl From<Direction> for TradeDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Long => Self::Long,
            Direction::Short => Self::Short,
        }
    }
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Wire-visible exit reason enumeration (spec §6). Ordering here is the
/// priority order the exit generator checks them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    SignalReversal,
    RegimeChange,
    TimeStop,
    VolatilitySpike,
    Manual,
    None,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StopLoss => "STOP_LOSS",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::TrailingStop => "TRAILING_STOP",
            Self::SignalReversal => "SIGNAL_REVERSAL",
            Self::RegimeChange => "REGIME_CHANGE",
            Self::TimeStop => "TIME_STOP",
            Self::VolatilitySpike => "VOLATILITY_SPIKE",
            Self::Manual => "MANUAL",
            Self::None => "NONE",
        };
        write!(f, "{s}")
    }
}

/// Urgency attached to an exit reason, used by collaborators to prioritise
/// how quickly the order-flow layer should act on the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitUrgency {
    Critical,
    High,
    Medium,
    Low,
}

impl ExitReason {
    /// Urgency associated with each reason, per spec §4.8.
    pub fn urgency(self) -> ExitUrgency {
        match self {
            Self::StopLoss => ExitUrgency::Critical,
            Self::TakeProfit | Self::TrailingStop => ExitUrgency::High,
            Self::SignalReversal
            | Self::RegimeChange
            | Self::VolatilitySpike => ExitUrgency::Medium,
            Self::TimeStop => ExitUrgency::Low,
            Self::Manual | Self::None => ExitUrgency::Low,
        }
    }
}

/// Outcome classification of a closed trade (diagnostics §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Breakeven,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Loss => write!(f, "loss"),
            Self::Breakeven => write!(f, "breakeven"),
        }
    }
}
