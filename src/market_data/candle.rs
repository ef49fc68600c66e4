// =============================================================================
// Candle storage — ring buffer of closed OHLCV bars per coin
// =============================================================================
//
// Candles arrive from a REST poll once per cycle (see `exchange::client`) and
// are pushed into a fixed-size ring buffer here. Unlike a WS feed there is no
// in-progress candle to replace in place — each poll either appends a new
// closed bar or is a no-op repeat of the most recent one.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A single closed OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub trades_count: u64,
    pub taker_buy_volume: f64,
    pub taker_buy_quote_volume: f64,
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandleKey {
    pub coin: String,
    pub interval: String,
}

impl CandleKey {
    pub fn new(coin: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            interval: interval.into(),
        }
    }
}

/// Fixed-capacity ring buffer of closed candles, one deque per (coin, interval).
pub struct CandleBuffer {
    buffers: RwLock<HashMap<CandleKey, VecDeque<Candle>>>,
    max_candles: usize,
}

impl CandleBuffer {
    pub fn new(max_candles: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            max_candles,
        }
    }

    /// Merge freshly polled candles into the buffer for `key`.
    ///
    /// `polled` is assumed sorted oldest-first, as returned by the exchange
    /// client. Candles already present (matched by `open_time`) are skipped;
    /// the trailing window is trimmed back down to `max_candles`.
    pub fn ingest(&self, key: CandleKey, polled: &[Candle]) {
        if polled.is_empty() {
            return;
        }
        let mut buffers = self.buffers.write();
        let deque = buffers.entry(key).or_insert_with(VecDeque::new);

        let last_known_open = deque.back().map(|c| c.open_time);
        for candle in polled {
            if !candle.is_closed {
                continue;
            }
            match last_known_open {
                Some(t) if candle.open_time <= t => continue,
                _ => {}
            }
            deque.push_back(*candle);
        }

        while deque.len() > self.max_candles {
            deque.pop_front();
        }
    }

    pub fn get_closed(&self, key: &CandleKey) -> Vec<Candle> {
        self.buffers
            .read()
            .get(key)
            .map(|d| d.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Alias kept for call sites that read more naturally as "closed candles".
    pub fn get_closed_candles(&self, key: &CandleKey) -> Vec<Candle> {
        self.get_closed(key)
    }

    pub fn get_closes(&self, key: &CandleKey) -> Vec<f64> {
        self.buffers
            .read()
            .get(key)
            .map(|d| d.iter().map(|c| c.close).collect())
            .unwrap_or_default()
    }

    pub fn last_close(&self, key: &CandleKey) -> Option<f64> {
        self.buffers.read().get(key)?.back().map(|c| c.close)
    }

    pub fn count(&self, key: &CandleKey) -> usize {
        self.buffers.read().get(key).map(|d| d.len()).unwrap_or(0)
    }
}
