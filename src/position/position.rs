// =============================================================================
// Position model — FIFO lot accounting for a single coin
// =============================================================================
//
// A position is either absent (no entry in the map) or present with one to
// `max_pyramids` entry lots. Exits consume lots FIFO; `chandelier_stop` is
// monotonic non-decreasing for the lifetime of the position.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryLot {
    pub ts: i64,
    pub price: f64,
    pub qty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfitTargetMode {
    PercentBased,
    BbBased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub coin: String,
    pub size: f64,
    pub avg_entry_price: f64,
    pub entry_count: u8,
    pub entry_lots: Vec<EntryLot>,
    pub highest_high_since_entry: f64,
    pub chandelier_stop: f64,
    pub first_target_hit: bool,
    pub second_target_hit: bool,
    pub position_pct: f64,
    pub profit_target_mode: ProfitTargetMode,
    pub tp1_pct: f64,
    pub tp2_pct: f64,
    pub chandelier_mult: f64,
}

/// Result of consuming lots FIFO for a partial or full exit.
#[derive(Debug, PartialEq)]
pub struct LotConsumption {
    pub matched_qty: f64,
    /// `(matched_qty, lot_price)` pairs consumed, oldest lot first.
    pub matches: Vec<(f64, f64)>,
}

impl Position {
    pub fn open(
        coin: impl Into<String>,
        ts: i64,
        entry_price: f64,
        qty: f64,
        atr_at_entry: f64,
        chandelier_mult: f64,
        profit_target_mode: ProfitTargetMode,
        tp1_pct: f64,
        tp2_pct: f64,
    ) -> Self {
        Self {
            coin: coin.into(),
            size: qty,
            avg_entry_price: entry_price,
            entry_count: 1,
            entry_lots: vec![EntryLot {
                ts,
                price: entry_price,
                qty,
            }],
            highest_high_since_entry: entry_price,
            chandelier_stop: entry_price - chandelier_mult * atr_at_entry,
            first_target_hit: false,
            second_target_hit: false,
            position_pct: 100.0,
            profit_target_mode,
            tp1_pct,
            tp2_pct,
            chandelier_mult,
        }
    }

    /// Add a pyramid lot; recomputes the weighted-average entry price.
    /// Resets `first_target_hit`/`position_pct` — adding to a position restarts its
    /// reset rule if the first target had already been hit.
    pub fn pyramid(&mut self, ts: i64, price: f64, qty: f64) {
        let total_cost = self.avg_entry_price * self.size + price * qty;
        self.size += qty;
        self.avg_entry_price = total_cost / self.size;
        self.entry_count += 1;
        self.entry_lots.push(EntryLot { ts, price, qty });

        if self.first_target_hit {
            self.first_target_hit = false;
            self.position_pct = 100.0;
        }
    }

    /// Consume `qty` from the head of `entry_lots` (FIFO), splitting the lot
    /// at the boundary when a partial match falls mid-lot.
    pub fn consume_fifo(&mut self, qty: f64) -> LotConsumption {
        let mut remaining = qty;
        let mut matches = Vec::new();

        while remaining > 1e-12 && !self.entry_lots.is_empty() {
            let lot = &mut self.entry_lots[0];
            if lot.qty <= remaining + 1e-12 {
                matches.push((lot.qty, lot.price));
                remaining -= lot.qty;
                self.entry_lots.remove(0);
            } else {
                matches.push((remaining, lot.price));
                lot.qty -= remaining;
                remaining = 0.0;
            }
        }

        let matched_qty: f64 = matches.iter().map(|(q, _)| q).sum();
        self.size -= matched_qty;
        LotConsumption {
            matched_qty,
            matches,
        }
    }

    /// Update the chandelier trail for the current bar. Monotonic
    /// non-decreasing.
    pub fn update_chandelier(&mut self, bar_high: f64, atr_now: f64) {
        self.highest_high_since_entry = self.highest_high_since_entry.max(bar_high);
        let candidate = self.highest_high_since_entry - self.chandelier_mult * atr_now;
        self.chandelier_stop = self.chandelier_stop.max(candidate);
    }

    /// Breakeven policy: after TP1, the stop never sits below the
    /// weighted-average entry price.
    pub fn lock_breakeven(&mut self) {
        self.chandelier_stop = self.chandelier_stop.max(self.avg_entry_price);
    }

    pub fn is_present(&self) -> bool {
        self.size > 1e-12
    }
}
