// =============================================================================
// Core — the single owned struct every task shares via `Arc<Core>`
// =============================================================================
//
// Grounded on `app_state.rs`'s `AppState` directly: the `AtomicU64`
// state-version counter, the `parking_lot::RwLock`-per-subsystem shape, and
// the `push_error`/`push_decision` bounded-ring-buffer idiom are kept
// verbatim. Rewritten: the subsystems themselves are this crate's own
// (candle aggregator, regime detector, throttle, diagnostics tracker, open
// positions) in place of the teacher's Binance-specific ones (trade
// processors, orderbook manager, risk engine, position manager), per spec
// §5's single-writer-many-readers model.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::candle::{Candle, CandleAggregator, Timeframe};
use crate::config::RuntimeConfig;
use crate::diagnostics::{
    compute_expectancy, filter_trades, DiagnosticsTracker, ExpectancyFilters, ExpectancyMetrics, ExitData,
    TradeDiagnostics, TradeOpenParams,
};
use crate::regime::RegimeDetector;
use crate::strategy::config::StrategyConfig;
use crate::strategy::exit::update_position_tracking;
use crate::strategy::gates::Throttle;
use crate::strategy::pipeline::{StrategyAnalysis, StrategyPipeline};
use crate::strategy::types::ActivePosition;
use crate::types::Direction;

const MAX_RECENT_ERRORS: usize = 50;
const MAX_RECENT_DECISIONS: usize = 100;

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub at: String,
}

/// An open position, labelled with the id the order-flow collaborator
/// created it under.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummary {
    pub id: String,
    #[serde(flatten)]
    pub position: ActivePosition,
}

/// On-demand JSON view of everything the HTTP/WS surface exposes (spec §3's
/// `StateSnapshot` entity). Never stored — rebuilt fresh per request from
/// the live subsystems.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time_ms: i64,
    pub trading_mode: String,
    pub account_mode: String,
    pub symbol: String,
    pub regime: crate::regime::RegimeState,
    pub open_positions: Vec<PositionSummary>,
    pub recent_decisions: Vec<StrategyAnalysis>,
    pub recent_errors: Vec<ErrorRecord>,
    pub expectancy: ExpectancyMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
}

/// Inbound `openTrade` request (spec §6). Stop-loss/take-profit are
/// expressed as percentages of `entry_price`; `Core::open_trade` converts
/// them to the absolute prices `ActivePosition` and the exit generator
/// reason about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeOpen {
    pub id: String,
    pub direction: Direction,
    pub entry_price: f64,
    /// Position size in SOL; needed only for diagnostics' fee-as-percent
    /// accounting, not by the exit generator itself.
    #[serde(default)]
    pub size: f64,
    pub signal_score: f64,
    pub signal_confidence: f64,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
}

/// Process-singleton decision core. Constructed once at boot inside an
/// `Arc` and handed to every task (price ingestion, HTTP handlers, the
/// order-flow collaborator).
pub struct Core {
    pub state_version: AtomicU64,

    pub runtime_config: RwLock<RuntimeConfig>,
    pub strategy_config: RwLock<StrategyConfig>,

    pub aggregator: CandleAggregator,
    pub regime_detector: RegimeDetector,
    pub throttle: Throttle,
    pub diagnostics: DiagnosticsTracker,

    positions: RwLock<HashMap<String, ActivePosition>>,
    recent_decisions: RwLock<VecDeque<StrategyAnalysis>>,
    recent_errors: RwLock<VecDeque<ErrorRecord>>,

    pub start_time: Instant,
}

impl Core {
    pub fn new(runtime_config: RuntimeConfig, strategy_config: StrategyConfig) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: RwLock::new(runtime_config),
            strategy_config: RwLock::new(strategy_config),
            aggregator: CandleAggregator::new(),
            regime_detector: RegimeDetector::new(),
            throttle: Throttle::new(crate::strategy::gates::ThrottleConfig::default()),
            diagnostics: DiagnosticsTracker::new(),
            positions: RwLock::new(HashMap::new()),
            recent_decisions: RwLock::new(VecDeque::new()),
            recent_errors: RwLock::new(VecDeque::new()),
            start_time: Instant::now(),
        }
    }

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    pub fn push_error(&self, message: String) {
        let mut errors = self.recent_errors.write();
        errors.push_back(ErrorRecord { message, at: Utc::now().to_rfc3339() });
        while errors.len() > MAX_RECENT_ERRORS {
            errors.pop_front();
        }
        self.increment_version();
    }

    fn push_decision(&self, analysis: StrategyAnalysis) {
        let mut decisions = self.recent_decisions.write();
        decisions.push_back(analysis);
        while decisions.len() > MAX_RECENT_DECISIONS {
            decisions.pop_front();
        }
        self.increment_version();
    }

    pub fn recent_decisions(&self) -> Vec<StrategyAnalysis> {
        self.recent_decisions.read().iter().cloned().collect()
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().iter().cloned().collect()
    }

    pub fn open_positions(&self) -> Vec<(String, ActivePosition)> {
        self.positions.read().iter().map(|(id, p)| (id.clone(), *p)).collect()
    }

    /// Build the full ambient state view served under `/api/v1/state` and
    /// pushed over the WebSocket. Grounded on `app_state.rs`'s
    /// `build_snapshot`, narrowed to this crate's own subsystems.
    pub fn snapshot(&self) -> StateSnapshot {
        let runtime_config = self.runtime_config.read();
        let open_positions = self
            .open_positions()
            .into_iter()
            .map(|(id, position)| PositionSummary { id, position })
            .collect();
        let last_price = self.aggregator.last_price();

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time_ms: Utc::now().timestamp_millis(),
            trading_mode: runtime_config.trading_mode.to_string(),
            account_mode: runtime_config.account_mode.to_string(),
            symbol: runtime_config.symbol.clone(),
            regime: self.regime_detector.current(),
            open_positions,
            recent_decisions: self.recent_decisions(),
            recent_errors: self.recent_errors(),
            expectancy: self.query_expectancy(&ExpectancyFilters::default()),
            last_price: (last_price > 0.0).then_some(last_price),
        }
    }

    // ── Inbound: onPrice ─────────────────────────────────────────────

    /// Authoritative price tick. The sole writer for candle state, every
    /// diagnostics tracker's excursion log, and open-position extremes
    /// (spec §5).
    pub fn on_price(&self, price: f64, ts_ms: i64) {
        self.aggregator.update(price, ts_ms);
        self.diagnostics.update_all(price, ts_ms);

        let mut positions = self.positions.write();
        for position in positions.values_mut() {
            update_position_tracking(position, price);
        }
        drop(positions);

        self.increment_version();
    }

    // ── Inbound: openTrade / closeTrade ──────────────────────────────

    pub fn open_trade(&self, open: TradeOpen, now_ms: i64) {
        let stop_loss_distance = open.entry_price * open.stop_loss_percent / 100.0;
        let take_profit_distance = open.entry_price * open.take_profit_percent / 100.0;
        let (initial_stop_loss, take_profit) = match open.direction {
            Direction::Long => (open.entry_price - stop_loss_distance, open.entry_price + take_profit_distance),
            Direction::Short => (open.entry_price + stop_loss_distance, open.entry_price - take_profit_distance),
        };

        let position = ActivePosition::open(open.direction, open.entry_price, now_ms, open.size, initial_stop_loss, take_profit);
        self.positions.write().insert(open.id.clone(), position);

        let regime_at_entry = self.regime_detector.current().confirmed;
        self.diagnostics.start_tracking_trade(
            TradeOpenParams {
                trade_id: open.id,
                direction: open.direction,
                entry_price: open.entry_price,
                entry_time_ms: now_ms,
                size: open.size,
                stop_loss_percent: open.stop_loss_percent,
                signal_score: open.signal_score,
                signal_confidence: open.signal_confidence,
            },
            regime_at_entry,
        );

        self.increment_version();
    }

    /// Close a trade: remove the active position, finalise its diagnostics,
    /// and feed the outcome into the throttle's loss-streak/cooldown
    /// tracking. Per spec §7, an unknown `id` still lets this proceed —
    /// the position simply wasn't present to remove.
    pub fn close_trade(&self, id: &str, exit: ExitData, now_ms: i64) -> Option<TradeDiagnostics> {
        if self.positions.write().remove(id).is_none() {
            warn!(trade_id = id, "close_trade: no active position for this id");
        }

        let regime_at_exit = self.regime_detector.current().confirmed;
        let diagnostics = self.diagnostics.stop_tracking_trade(id, exit, regime_at_exit);

        if let Some(d) = &diagnostics {
            self.throttle.record_trade(d.outcome, d.exit_reason, now_ms);
        }

        self.increment_version();
        diagnostics
    }

    // ── Inbound: queryStrategy ───────────────────────────────────────

    /// Run the strategy pipeline at `timeframe`, optionally against a
    /// currently open position (looked up by id). Records the result in the
    /// bounded decision-audit ring.
    pub fn query_strategy(&self, timeframe: Timeframe, position_id: Option<&str>, now_ms: i64) -> Option<StrategyAnalysis> {
        let config = self.strategy_config.read().clone();
        let position = position_id.and_then(|id| self.positions.read().get(id).copied());

        let pipeline = StrategyPipeline::new(&self.aggregator, &self.regime_detector, &self.throttle);
        let analysis = pipeline.analyze_multi_timeframe(timeframe, position.as_ref(), &config, now_ms);

        if let Some(a) = &analysis {
            self.push_decision(a.clone());
        }
        analysis
    }

    // ── Inbound: queryDiagnostics / queryExpectancy ──────────────────

    pub fn query_diagnostics(&self, filters: &ExpectancyFilters) -> Vec<TradeDiagnostics> {
        filter_trades(&self.diagnostics.completed(), filters)
    }

    pub fn query_expectancy(&self, filters: &ExpectancyFilters) -> ExpectancyMetrics {
        compute_expectancy(&self.query_diagnostics(filters))
    }

    // ── Inbound: seedHistoricalCandles ───────────────────────────────

    pub fn seed_historical_candles(&self, tf: Timeframe, candles: &[Candle]) {
        self.aggregator.load_historical(tf, candles);
        self.increment_version();
    }

    /// Wipe every subsystem's state. Used by tests and on supervised
    /// restart; never called from the HTTP surface.
    pub fn reset(&self) {
        self.aggregator.reset();
        self.regime_detector.reset();
        self.throttle.reset();
        self.diagnostics.reset();
        self.positions.write().clear();
        self.recent_decisions.write().clear();
        self.recent_errors.write().clear();
        self.increment_version();
    }
}
