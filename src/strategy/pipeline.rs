// =============================================================================
// Strategy Pipeline — composes the gates and signal generators into one
// `StrategyAnalysis`
// =============================================================================
//
// Grounded on `strategy.rs`'s `evaluate_symbol` shape (fetch snapshot →
// regime → score → gates → proposal) and `decision_envelope.rs`'s
// allow/blocked envelope idiom — rewritten into spec §4.9's exact nine-step
// ordering and field set. `StrategyAnalysis` replaces both
// `DecisionEnvelope` and `TradeProposal`: one value carries every gate's
// verdict plus whichever signal (entry or exit) applies.

use serde::Serialize;

use crate::candle::{CandleAggregator, Timeframe};
use crate::indicators::snapshot::IndicatorSnapshot;
use crate::regime::{RegimeDetector, RegimeState};
use crate::strategy::config::StrategyConfig;
use crate::strategy::entry::{generate_entry_signal, EntrySignal, EntryWarning};
use crate::strategy::exit::{evaluate_exit, ExitSignal};
use crate::strategy::gates::{EntryConfirmation, EntryConfirmationResult, Throttle, ThrottleResult, Tradability, TradabilityResult};
use crate::strategy::types::ActivePosition;
use crate::types::{Direction, TradeDirection};

const TRADABILITY_TIMEFRAME: Timeframe = Timeframe::M15;
const CONFIRMATION_TIMEFRAME: Timeframe = Timeframe::M1;
const MULTI_TF_SCORE_THRESHOLD: f64 = 15.0;
const MULTI_TF_CONFIDENCE_BOOST: f64 = 10.0;
const MULTI_TF_CONFIDENCE_CAP: f64 = 95.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAnalysis {
    pub timeframe: Timeframe,
    pub price: f64,
    pub ts: i64,
    pub tradability: TradabilityResult,
    pub throttle: ThrottleResult,
    pub entry_confirmation: Option<EntryConfirmationResult>,
    pub regime: RegimeState,
    pub entry: EntrySignal,
    pub exit: Option<ExitSignal>,
    pub config: StrategyConfig,
}

/// Ties the candle aggregator, regime detector and throttle together into
/// the nine-step decision sequence. Holds no state of its own — every
/// subsystem it touches is a process-singleton passed in by reference, so
/// an analysis is a transient value, never stored.
pub struct StrategyPipeline<'a> {
    pub aggregator: &'a CandleAggregator,
    pub regime_detector: &'a RegimeDetector,
    pub throttle: &'a Throttle,
}

impl<'a> StrategyPipeline<'a> {
    pub fn new(aggregator: &'a CandleAggregator, regime_detector: &'a RegimeDetector, throttle: &'a Throttle) -> Self {
        Self { aggregator, regime_detector, throttle }
    }

    /// Run the full nine-step pipeline at `timeframe`. Returns `None` if
    /// there isn't yet a snapshot at that timeframe (step 1).
    pub fn analyze(
        &self,
        timeframe: Timeframe,
        position: Option<&ActivePosition>,
        config: &StrategyConfig,
        now_ms: i64,
    ) -> Option<StrategyAnalysis> {
        // 1. Snapshot at the analysis timeframe.
        let candles = self.aggregator.candles(timeframe, timeframe.capacity() + 1);
        let snapshot = IndicatorSnapshot::compute(timeframe, &candles)?;
        let price = self.aggregator.last_price();

        // 2. Tradability (always the 15m snapshot, regardless of analysis tf).
        let tradability_candles = self.aggregator.candles(TRADABILITY_TIMEFRAME, TRADABILITY_TIMEFRAME.capacity() + 1);
        let tradability = IndicatorSnapshot::compute(TRADABILITY_TIMEFRAME, &tradability_candles)
            .map(|s| Tradability::evaluate(&s))
            .unwrap_or(TradabilityResult { tradable: false, reason: Some("no 15m snapshot available".to_string()) });

        // 3. Throttle.
        let throttle = self.throttle.check(now_ms);

        // 4. Regime.
        let regime = self.regime_detector.update(snapshot.atr_level, snapshot.adx.as_ref(), snapshot.ema_trend);

        // 5. Entry signal.
        let mut entry = generate_entry_signal(&snapshot, &regime, price, config);

        // 6. Tradability/throttle veto an entry that would otherwise fire.
        if entry.should_enter && !tradability.tradable {
            entry.should_enter = false;
            entry.direction = TradeDirection::None;
        }
        if entry.should_enter && !throttle.allowed {
            entry.should_enter = false;
            entry.direction = TradeDirection::None;
        }

        // 7. Entry confirmation on the 1-minute snapshot.
        let entry_confirmation = if entry.should_enter {
            let confirm_candles = self.aggregator.candles(CONFIRMATION_TIMEFRAME, CONFIRMATION_TIMEFRAME.capacity() + 1);
            let confirmation = IndicatorSnapshot::compute(CONFIRMATION_TIMEFRAME, &confirm_candles).map(|s| {
                let direction = if entry.direction == TradeDirection::Long { Direction::Long } else { Direction::Short };
                EntryConfirmation::evaluate(&s, direction)
            });
            if let Some(result) = &confirmation {
                if !result.confirmed {
                    entry.should_enter = false;
                    entry.direction = TradeDirection::None;
                }
            }
            confirmation
        } else {
            None
        };

        // 8. Exit signal, if a position is loaned to us — evaluated even
        // when the market isn't currently tradable.
        let exit = position.map(|p| evaluate_exit(p, &snapshot, &regime.confirmed, config, price, now_ms));

        Some(StrategyAnalysis {
            timeframe,
            price,
            ts: snapshot.ts,
            tradability,
            throttle,
            entry_confirmation,
            regime,
            entry,
            exit,
            config: config.clone(),
        })
    }

    /// Multi-timeframe variant: re-evaluates the composite score on each of
    /// `config.timeframes_to_check` and, if
    /// `require_multi_timeframe_confirmation` is set, cancels the entry on
    /// any disagreement; on unanimous agreement it appends a confirmation
    /// reason and boosts confidence (capped at 95).
    pub fn analyze_multi_timeframe(
        &self,
        timeframe: Timeframe,
        position: Option<&ActivePosition>,
        config: &StrategyConfig,
        now_ms: i64,
    ) -> Option<StrategyAnalysis> {
        let mut analysis = self.analyze(timeframe, position, config, now_ms)?;

        if !config.require_multi_timeframe_confirmation || analysis.entry.direction == TradeDirection::None {
            return Some(analysis);
        }

        let direction = analysis.entry.direction;
        let mut unanimous = true;
        for &tf in &config.timeframes_to_check {
            let candles = self.aggregator.candles(tf, tf.capacity() + 1);
            let Some(snap) = IndicatorSnapshot::compute(tf, &candles) else {
                unanimous = false;
                break;
            };
            let score = snap.composite.score;
            let agrees = match direction {
                TradeDirection::Long => score >= MULTI_TF_SCORE_THRESHOLD,
                TradeDirection::Short => score <= -MULTI_TF_SCORE_THRESHOLD,
                TradeDirection::None => true,
            };
            if !agrees {
                unanimous = false;
                break;
            }
        }

        if unanimous {
            analysis.entry.reasons.push(EntryReasonMultiTf::MultiTimeframeConfirmed.into());
            analysis.entry.confidence = (analysis.entry.confidence + MULTI_TF_CONFIDENCE_BOOST).min(MULTI_TF_CONFIDENCE_CAP);
        } else {
            analysis.entry.should_enter = false;
            analysis.entry.direction = TradeDirection::None;
            analysis.entry.warnings.push(EntryWarning::MultiTimeframeDisagreement);
        }

        Some(analysis)
    }
}

// `generate_entry_signal`'s `EntryReason` enum already has
// `MultiTimeframeConfirmed`; this indirection just keeps the import list
// above readable (avoids a second `use` line for one variant).
type EntryReasonMultiTf = crate::strategy::entry::EntryReason;
