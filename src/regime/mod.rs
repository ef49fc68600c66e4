// =============================================================================
// Regime Classification Module
// =============================================================================
//
// Classifies the current market regime from EMA50/EMA200 separation and ADX,
// with a volatility label from ATR% vs its rolling average and 2-cycle
// hysteresis on regime changes.

pub mod classifier;

pub use classifier::{MarketRegime, RegimeClassifier, RegimeInputs, RegimeState, Volatility};
