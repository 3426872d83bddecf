// =============================================================================
// StrategyConfig — tunables for entry/exit sizing and gating
// =============================================================================
//
// Same shape as `RuntimeConfig`: every field has a `#[serde(default = "...")]`
// helper, `Default` calls the same helpers, and the whole thing round-trips
// through an atomic tmp-then-rename save so partial JSON on disk never loses
// a field added after the file was written.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

fn default_min_confidence_to_enter() -> f64 {
    60.0
}

fn default_min_score_to_enter() -> f64 {
    20.0
}

fn default_atr_stop_loss_multiplier() -> f64 {
    2.0
}

fn default_atr_take_profit_multiplier() -> f64 {
    4.0
}

fn default_true() -> bool {
    true
}

fn default_trailing_stop_activation_percent() -> f64 {
    0.8
}

fn default_trailing_stop_distance_percent() -> f64 {
    0.4
}

fn default_max_hold_time_seconds() -> u64 {
    1800
}

fn default_base_position_size() -> f64 {
    0.1
}

fn default_min_position_size_multiplier() -> f64 {
    0.5
}

fn default_max_position_size_multiplier() -> f64 {
    1.5
}

fn default_false() -> bool {
    false
}

fn default_timeframes_to_check() -> Vec<crate::candle::Timeframe> {
    vec![crate::candle::Timeframe::M5, crate::candle::Timeframe::M15]
}

/// Entry/exit/sizing tunables, analogous to `RuntimeConfig::strategy_params`
/// but scoped to the decision core rather than order execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    /// Composite confidence floor; below this, direction is forced to NONE.
    #[serde(default = "default_min_confidence_to_enter")]
    pub min_confidence_to_enter: f64,

    /// Composite score magnitude required to pick a direction at all.
    #[serde(default = "default_min_score_to_enter")]
    pub min_score_to_enter: f64,

    /// ATR multiplier applied to the stop-loss distance.
    #[serde(default = "default_atr_stop_loss_multiplier")]
    pub atr_stop_loss_multiplier: f64,

    /// ATR multiplier applied to the take-profit distance.
    #[serde(default = "default_atr_take_profit_multiplier")]
    pub atr_take_profit_multiplier: f64,

    /// Master switch for the trailing-stop exit check.
    #[serde(default = "default_true")]
    pub enable_trailing_stop: bool,

    /// Minimum `maxPnLPercent` before the trailing stop arms.
    #[serde(default = "default_trailing_stop_activation_percent")]
    pub trailing_stop_activation_percent: f64,

    /// Trail distance below (LONG) or above (SHORT) the extreme price.
    #[serde(default = "default_trailing_stop_distance_percent")]
    pub trailing_stop_distance_percent: f64,

    /// Hold-time ceiling in seconds before the time-stop fires.
    #[serde(default = "default_max_hold_time_seconds")]
    pub max_hold_time_seconds: u64,

    /// Base position size before confidence/regime scaling, in SOL.
    #[serde(default = "default_base_position_size")]
    pub base_position_size: f64,

    #[serde(default = "default_min_position_size_multiplier")]
    pub min_position_size_multiplier: f64,

    #[serde(default = "default_max_position_size_multiplier")]
    pub max_position_size_multiplier: f64,

    /// Whether the entry signal generator consults the regime at all.
    #[serde(default = "default_false")]
    pub enable_regime_filter: bool,

    /// If the filter is on, whether `ranging` is still an acceptable regime.
    #[serde(default = "default_true")]
    pub allow_trading_in_ranging: bool,

    /// Require unanimous agreement across `timeframes_to_check` before an
    /// entry is allowed to stand.
    #[serde(default = "default_false")]
    pub require_multi_timeframe_confirmation: bool,

    /// Additional timeframes consulted when multi-timeframe confirmation is
    /// enabled.
    #[serde(default = "default_timeframes_to_check")]
    pub timeframes_to_check: Vec<crate::candle::Timeframe>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_confidence_to_enter: default_min_confidence_to_enter(),
            min_score_to_enter: default_min_score_to_enter(),
            atr_stop_loss_multiplier: default_atr_stop_loss_multiplier(),
            atr_take_profit_multiplier: default_atr_take_profit_multiplier(),
            enable_trailing_stop: true,
            trailing_stop_activation_percent: default_trailing_stop_activation_percent(),
            trailing_stop_distance_percent: default_trailing_stop_distance_percent(),
            max_hold_time_seconds: default_max_hold_time_seconds(),
            base_position_size: default_base_position_size(),
            min_position_size_multiplier: default_min_position_size_multiplier(),
            max_position_size_multiplier: default_max_position_size_multiplier(),
            enable_regime_filter: false,
            allow_trading_in_ranging: true,
            require_multi_timeframe_confirmation: false,
            timeframes_to_check: default_timeframes_to_check(),
        }
    }
}

impl StrategyConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read strategy config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse strategy config from {}", path.display()))?;
        info!(path = %path.display(), "strategy config loaded");
        Ok(config)
    }

    /// Load from `path`, falling back to defaults (and a warning) if the
    /// file is absent or unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                if path.exists() {
                    warn!(path = %path.display(), error = %err, "strategy config present but unreadable, using defaults");
                } else {
                    warn!(path = %path.display(), "strategy config absent, using defaults");
                }
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise strategy config to JSON")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp strategy config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp strategy config to {}", path.display()))?;
        info!(path = %path.display(), "strategy config saved (atomic)");
        Ok(())
    }
}
