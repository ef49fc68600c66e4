// =============================================================================
// Indicator Library — pure functions over OHLCV series
// =============================================================================
//
// Every function here is a pure `f(series, params) -> series` transform with
// no I/O and no shared state. Warmup and NaN/Inf handling follow the shared
// contract in `clean`.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod clean;
pub mod ema;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod stochastic;
pub mod volume_ratio;
