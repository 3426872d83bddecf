// =============================================================================
// Strategy — gates, signal generators and the pipeline that composes them
// =============================================================================
//
// Everything in this module is either a pure function over an
// `IndicatorSnapshot` (the gates, the signal generators) or a thin
// process-wide guard with its own internal lock (`Throttle`). Nothing here
// touches I/O; `pipeline::StrategyPipeline` is the only thing that reaches
// across subsystem locks, and it does so by taking already-read snapshots
// rather than holding more than one lock at a time.

pub mod config;
pub mod entry;
pub mod exit;
pub mod gates;
pub mod pipeline;
pub mod types;

pub use config::StrategyConfig;
pub use entry::{generate_entry_signal, EntryReason, EntrySignal, EntryWarning};
pub use exit::{evaluate_exit, update_position_tracking, ExitSignal};
pub use gates::{EntryConfirmation, Throttle, ThrottleConfig, ThrottleResult, Tradability};
pub use pipeline::{StrategyAnalysis, StrategyPipeline};
pub use types::ActivePosition;
