// =============================================================================
// MACD — Moving Average Convergence Divergence
// =============================================================================
//
// line      = EMA(closes, fast) - EMA(closes, slow)
// signal    = EMA(line, signal_period)
// histogram = line - signal
//
// Defaults: fast = 8, slow = 17, signal = 9.

use super::ema::calculate_ema;

pub const DEFAULT_FAST: usize = 8;
pub const DEFAULT_SLOW: usize = 17;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Compute the most recent MACD line/signal/histogram triple.
///
/// Returns `None` until there are enough closes to warm up the slow EMA plus
/// the signal EMA on top of it.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> Option<MacdValue> {
    if fast == 0 || slow == 0 || signal_period == 0 || fast >= slow {
        return None;
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    if ema_fast.is_empty() || ema_slow.is_empty() {
        return None;
    }

    // ema_fast is longer than ema_slow by (slow - fast) leading elements;
    // align both series to the tail shared by both.
    let skip = ema_fast.len().saturating_sub(ema_slow.len());
    let aligned_fast = &ema_fast[skip..];
    let line_series: Vec<f64> = aligned_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    if line_series.len() < signal_period {
        return None;
    }

    let signal_series = calculate_ema(&line_series, signal_period);
    let signal = *signal_series.last()?;
    let line = *line_series.last()?;

    Some(MacdValue {
        line,
        signal,
        histogram: line - signal,
    })
}

/// MACD with the strategy's default parameters (fast=8, slow=17, signal=9).
pub fn macd_default(closes: &[f64]) -> Option<MacdValue> {
    macd(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn insufficient_data_returns_none() {
        assert!(macd_default(&ascending(10)).is_none());
    }

    #[test]
    fn warms_up_and_returns_value() {
        let closes = ascending(60);
        let v = macd_default(&closes).expect("should warm up with 60 bars");
        assert!(v.line.is_finite());
        assert!(v.signal.is_finite());
        assert!((v.histogram - (v.line - v.signal)).abs() < 1e-10);
    }

    #[test]
    fn steady_uptrend_has_positive_line() {
        // A sustained uptrend means the fast EMA sits above the slow EMA.
        let closes = ascending(100);
        let v = macd_default(&closes).unwrap();
        assert!(v.line > 0.0);
    }

    #[test]
    fn invalid_periods_return_none() {
        let closes = ascending(100);
        assert!(macd(&closes, 0, 17, 9).is_none());
        assert!(macd(&closes, 17, 17, 9).is_none());
        assert!(macd(&closes, 20, 17, 9).is_none());
    }
}
