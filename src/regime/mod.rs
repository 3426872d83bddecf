// =============================================================================
// Regime Detection Module
// =============================================================================
//
// Market regime classification from ATR%, ADX (with +DI/-DI) and the EMA
// trend stack, smoothed through a hysteresis state machine.

pub mod detector;

pub use detector::{Regime, RegimeDetector, RegimeState, STABILITY_REQUIRED};
