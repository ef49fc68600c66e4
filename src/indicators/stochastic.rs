// =============================================================================
// Stochastic Oscillator — %K / %D
// =============================================================================
//
// %K = 100 * (close - lowest_low(period)) / (highest_high(period) - lowest_low(period))
// %D = SMA(%K, d_period)
//
// Defaults: period = 14, d_period = 3.

use crate::market_data::candle::Candle;

use super::ma::sma;

pub const DEFAULT_PERIOD: usize = 14;
pub const DEFAULT_D_PERIOD: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticValue {
    pub k: f64,
    pub d: f64,
}

/// Raw %K for a single trailing window ending at `candles.last()`.
///
/// Returns `None` if there are fewer than `period` candles. When the high/low
/// range is zero (a flat window), %K is defined as neutral (50.0).
fn percent_k(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let window = &candles[candles.len() - period..];
    let highest_high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let lowest_low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let close = window.last()?.close;

    let range = highest_high - lowest_low;
    if range.abs() < 1e-12 {
        return Some(50.0);
    }
    Some(100.0 * (close - lowest_low) / range)
}

/// Full %K series, `None` entries before warmup.
fn percent_k_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    (0..candles.len())
        .map(|i| percent_k(&candles[..=i], period))
        .collect()
}

/// Compute the most recent %K / %D pair.
pub fn stochastic(candles: &[Candle], period: usize, d_period: usize) -> Option<StochasticValue> {
    let k_series = percent_k_series(candles, period);
    let k = *k_series.last()?;
    let k = k?;

    let recent_ks: Vec<f64> = k_series
        .iter()
        .rev()
        .take(d_period)
        .rev()
        .copied()
        .collect::<Option<Vec<f64>>>()?;
    let d = sma(&recent_ks, d_period)?;

    Some(StochasticValue { k, d })
}

/// Stochastic with the strategy's default parameters (period=14, d_period=3).
pub fn stochastic_default(candles: &[Candle]) -> Option<StochasticValue> {
    stochastic(candles, DEFAULT_PERIOD, DEFAULT_D_PERIOD)
}

/// Whether %K crossed above %D between the previous and current bar, with
/// both readings in oversold territory (<20) — the entry-scoring trigger.
pub fn bullish_cross_in_oversold(prev: StochasticValue, current: StochasticValue) -> bool {
    let crossed_up = prev.k <= prev.d && current.k > current.d;
    crossed_up && prev.k < 20.0 && prev.d < 20.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open_time: 0,
            close_time: 0,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
            quote_volume: 1.0,
            trades_count: 1,
            taker_buy_volume: 0.0,
            taker_buy_quote_volume: 0.0,
            is_closed: true,
        }
    }

    #[test]
    fn insufficient_data_returns_none() {
        let candles: Vec<Candle> = (0..5).map(|i| candle(i as f64 + 1.0, i as f64, i as f64 + 0.5)).collect();
        assert!(stochastic(&candles, 14, 3).is_none());
    }

    #[test]
    fn flat_range_is_neutral() {
        let candles: Vec<Candle> = (0..20).map(|_| candle(100.0, 100.0, 100.0)).collect();
        let v = stochastic_default(&candles).unwrap();
        assert!((v.k - 50.0).abs() < 1e-9);
    }

    #[test]
    fn close_at_high_gives_k_100() {
        let mut candles: Vec<Candle> = (0..20).map(|i| candle(10.0 + i as f64, 0.0, 5.0)).collect();
        let last = candles.len() - 1;
        candles[last].close = candles[last].high;
        let v = stochastic_default(&candles).unwrap();
        assert!((v.k - 100.0).abs() < 1e-9);
    }

    #[test]
    fn bullish_cross_detected() {
        let prev = StochasticValue { k: 10.0, d: 15.0 };
        let current = StochasticValue { k: 18.0, d: 16.0 };
        assert!(bullish_cross_in_oversold(prev, current));
    }

    #[test]
    fn cross_outside_oversold_not_flagged() {
        let prev = StochasticValue { k: 40.0, d: 45.0 };
        let current = StochasticValue { k: 50.0, d: 46.0 };
        assert!(!bullish_cross_in_oversold(prev, current));
    }
}
