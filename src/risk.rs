// =============================================================================
// Risk Engine — daily-loss and consecutive-loss circuit breakers
// =============================================================================
//
// Tracks the Daily Counters record and gates trading through two
// breakers: cumulative realized P&L for the day vs. a loss cap, and a streak
// of consecutive losing trades. `max_positions` and `max_daily_trades` are
// portfolio-wide caps enforced by the Portfolio Manager, not here.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCounters {
    pub date: String,
    pub trades_today: u32,
    pub realized_pnl_today: f64,
    pub consecutive_losses: u32,
}

impl DailyCounters {
    fn reset(date: String) -> Self {
        Self {
            date,
            trades_today: 0,
            realized_pnl_today: 0.0,
            consecutive_losses: 0,
        }
    }
}

pub struct RiskEngine {
    counters: RwLock<DailyCounters>,
    account_value: f64,
    max_daily_loss_pct: f64,
    max_consecutive_losses: u32,
}

impl RiskEngine {
    pub fn new(account_value: f64, max_daily_loss_pct: f64, max_consecutive_losses: u32) -> Self {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        info!(
            account_value,
            max_daily_loss_pct, max_consecutive_losses, "risk engine initialised"
        );
        Self {
            counters: RwLock::new(DailyCounters::reset(today)),
            account_value,
            max_daily_loss_pct,
            max_consecutive_losses,
        }
    }

    /// Restore counters from persisted state (e.g. on startup), skipping a
    /// reset if the persisted date matches today.
    pub fn with_counters(
        account_value: f64,
        max_daily_loss_pct: f64,
        max_consecutive_losses: u32,
        counters: DailyCounters,
    ) -> Self {
        let engine = Self::new(account_value, max_daily_loss_pct, max_consecutive_losses);
        *engine.counters.write() = counters;
        engine.maybe_reset_daily();
        engine
    }

    /// Count a new-risk dispatch (`Enter`/`Pyramid`) toward `trades_today`
    /// without touching realized P&L or the consecutive-loss streak — those
    /// are only known once a position closes.
    pub fn record_trade_opened(&self) {
        self.maybe_reset_daily();
        let mut c = self.counters.write();
        c.trades_today += 1;
        debug!(trades_today = c.trades_today, "trade open recorded");
    }

    /// Record a closed trade's realized P&L and update the loss streak.
    pub fn record_trade_result(&self, realized_pnl: f64) {
        self.maybe_reset_daily();
        let mut c = self.counters.write();
        c.trades_today += 1;
        c.realized_pnl_today += realized_pnl;
        if realized_pnl < 0.0 {
            c.consecutive_losses += 1;
        } else {
            c.consecutive_losses = 0;
        }
        debug!(
            realized_pnl,
            trades_today = c.trades_today,
            realized_pnl_today = c.realized_pnl_today,
            consecutive_losses = c.consecutive_losses,
            "trade result recorded"
        );
    }

    /// Whether new `Enter`/`Pyramid` intents may be dispatched. Exits always
    /// proceed regardless of this gate.
    pub fn can_open_new_risk(&self) -> (bool, Option<String>) {
        self.maybe_reset_daily();
        let c = self.counters.read();

        let loss_floor = -self.max_daily_loss_pct * self.account_value;
        if c.realized_pnl_today < loss_floor {
            let msg = format!(
                "daily loss breaker tripped: {:.2} realized vs floor {:.2}",
                c.realized_pnl_today, loss_floor
            );
            warn!("{}", msg);
            return (false, Some(msg));
        }

        if c.consecutive_losses >= self.max_consecutive_losses {
            let msg = format!(
                "consecutive-loss breaker tripped: {} losses (limit {})",
                c.consecutive_losses, self.max_consecutive_losses
            );
            warn!("{}", msg);
            return (false, Some(msg));
        }

        (true, None)
    }

    pub fn snapshot(&self) -> DailyCounters {
        self.maybe_reset_daily();
        self.counters.read().clone()
    }

    fn maybe_reset_daily(&self) {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        {
            let c = self.counters.read();
            if c.date == today {
                return;
            }
        }
        let mut c = self.counters.write();
        if c.date != today {
            info!(old_date = %c.date, new_date = %today, "date rolled — resetting daily counters");
            *c = DailyCounters::reset(today);
        }
    }
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("account_value", &self.account_value)
            .field("max_daily_loss_pct", &self.max_daily_loss_pct)
            .field("max_consecutive_losses", &self.max_consecutive_losses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_losses_trip_the_breaker() {
        let engine = RiskEngine::new(1_000_000.0, 0.03, 3);
        engine.record_trade_result(-1.0);
        engine.record_trade_result(-1.0);
        engine.record_trade_result(-1.0);
        let (allowed, reason) = engine.can_open_new_risk();
        assert!(!allowed);
        assert!(reason.unwrap().contains("consecutive-loss"));
    }

    #[test]
    fn a_win_resets_the_loss_streak() {
        let engine = RiskEngine::new(1_000_000.0, 0.03, 3);
        engine.record_trade_result(-1.0);
        engine.record_trade_result(-1.0);
        engine.record_trade_result(5.0);
        let (allowed, _) = engine.can_open_new_risk();
        assert!(allowed);
        assert_eq!(engine.snapshot().consecutive_losses, 0);
    }

    #[test]
    fn daily_loss_cap_trips_the_breaker() {
        let engine = RiskEngine::new(100_000.0, 0.03, 10);
        engine.record_trade_result(-4_000.0);
        let (allowed, reason) = engine.can_open_new_risk();
        assert!(!allowed);
        assert!(reason.unwrap().contains("daily loss"));
    }

    #[test]
    fn trades_below_caps_are_allowed() {
        let engine = RiskEngine::new(1_000_000.0, 0.03, 5);
        engine.record_trade_result(100.0);
        let (allowed, reason) = engine.can_open_new_risk();
        assert!(allowed);
        assert!(reason.is_none());
    }

    #[test]
    fn record_trade_opened_bumps_count_without_touching_streak() {
        let engine = RiskEngine::new(1_000_000.0, 0.03, 3);
        engine.record_trade_result(-1.0);
        engine.record_trade_result(-1.0);
        engine.record_trade_opened();
        engine.record_trade_opened();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.trades_today, 4);
        assert_eq!(snapshot.consecutive_losses, 2);
    }
}
