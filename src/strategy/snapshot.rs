// =============================================================================
// Indicator Snapshot — per-coin, per-cycle bundle of computed indicators
// =============================================================================

use serde::Serialize;

use crate::indicators::{adx, atr, bollinger, clean, ema, ma, macd, rsi, stochastic, volume_ratio};
use crate::market_data::candle::Candle;

pub const MA_SHORT_PERIOD: usize = 9;
pub const MA_LONG_PERIOD: usize = 21;
pub const EMA_REGIME_SHORT: usize = 50;
pub const EMA_REGIME_LONG: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const BB_PERIOD: usize = 20;
pub const BB_NUM_STD: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const AVG_ATR_LOOKBACK: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSnapshot {
    pub ma_short: f64,
    pub ma_long: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub rsi: f64,
    pub bb_upper: f64,
    pub bb_mid: f64,
    pub bb_lower: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub atr: f64,
    pub atr_pct: f64,
    pub avg_atr_pct: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub adx: f64,
    pub volume_ratio: f64,
}

/// Minimum number of closed candles required to compute every indicator
/// above (dominated by EMA200's warmup).
pub const MIN_WARMUP_CANDLES: usize = EMA_REGIME_LONG;

/// Build one cycle's indicator snapshot from a coin's closed candle history
/// (oldest first). Returns `None` if there isn't enough history yet —
/// callers surface this as `CoreError::IndicatorWarmup`.
pub fn build_snapshot(candles: &[Candle]) -> Option<IndicatorSnapshot> {
    if candles.len() < MIN_WARMUP_CANDLES {
        return None;
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let ma_short = ma::sma(&closes, MA_SHORT_PERIOD)?;
    let ma_long = ma::sma(&closes, MA_LONG_PERIOD)?;
    let ema50 = *ema::calculate_ema(&closes, EMA_REGIME_SHORT).last()?;
    let ema200 = *ema::calculate_ema(&closes, EMA_REGIME_LONG).last()?;

    let rsi_raw = *rsi::calculate_rsi(&closes, RSI_PERIOD).last()?;
    let rsi_val = clean::clip(rsi_raw, 0.0, 100.0);
    let rsi_val = clean::normalize_scalar(rsi_val, 50.0);

    let bb = bollinger::calculate_bollinger(&closes, BB_PERIOD, BB_NUM_STD)?;

    let macd_value = macd::macd_default(&closes)?;

    let atr_val = atr::calculate_atr(candles, ATR_PERIOD)?;
    let atr_pct = atr::calculate_atr_pct(candles, ATR_PERIOD)?;

    let avg_atr_pct = rolling_avg_atr_pct(candles, ATR_PERIOD, AVG_ATR_LOOKBACK).unwrap_or(atr_pct);

    let stoch = stochastic::stochastic_default(candles)?;

    let adx_raw = adx::calculate_adx(candles, ADX_PERIOD).unwrap_or(0.0);
    let adx_val = clean::normalize_scalar(clean::clip(adx_raw, 0.0, 100.0), 0.0);

    let vol_ratio = volume_ratio::volume_ratio_default(&volumes).unwrap_or(1.0);

    Some(IndicatorSnapshot {
        ma_short,
        ma_long,
        ema50,
        ema200,
        rsi: rsi_val,
        bb_upper: bb.upper,
        bb_mid: bb.middle,
        bb_lower: bb.lower,
        macd_line: macd_value.line,
        macd_signal: macd_value.signal,
        macd_histogram: macd_value.histogram,
        atr: atr_val,
        atr_pct,
        avg_atr_pct,
        stoch_k: stoch.k,
        stoch_d: stoch.d,
        adx: adx_val,
        volume_ratio: vol_ratio,
    })
}

/// Average ATR% over the trailing `lookback` bars, used as the regime
/// classifier's volatility baseline.
fn rolling_avg_atr_pct(candles: &[Candle], atr_period: usize, lookback: usize) -> Option<f64> {
    let n = candles.len();
    if n < atr_period + 1 {
        return None;
    }
    let start = n.saturating_sub(lookback);
    let mut sum = 0.0;
    let mut count = 0;
    for end in (start + atr_period + 1).max(atr_period + 1)..=n {
        if let Some(pct) = atr::calculate_atr_pct(&candles[..end], atr_period) {
            sum += pct;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(i: usize, close: f64) -> Candle {
        Candle {
            open_time: i as i64,
            close_time: i as i64 + 1,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
            quote_volume: 100.0 * close,
            trades_count: 10,
            taker_buy_volume: 50.0,
            taker_buy_quote_volume: 50.0 * close,
            is_closed: true,
        }
    }

    #[test]
    fn insufficient_history_returns_none() {
        let candles: Vec<Candle> = (0..50).map(|i| candle(i, 100.0 + i as f64)).collect();
        assert!(build_snapshot(&candles).is_none());
    }

    #[test]
    fn full_history_produces_snapshot() {
        let candles: Vec<Candle> = (0..250).map(|i| candle(i, 100.0 + (i as f64 * 0.1))).collect();
        let snap = build_snapshot(&candles).expect("should warm up with 250 bars");
        assert!(snap.ema50.is_finite());
        assert!(snap.ema200.is_finite());
        assert!((0.0..=100.0).contains(&snap.rsi));
        assert!((0.0..=100.0).contains(&snap.adx));
        assert!(snap.bb_upper >= snap.bb_mid);
        assert!(snap.bb_mid >= snap.bb_lower);
    }
}
