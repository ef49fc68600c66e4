// =============================================================================
// Portfolio Manager (C7) — per-cycle coin iteration and portfolio-wide caps
// =============================================================================

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::PortfolioConfig;
use crate::execution::Executor;
use crate::position::PositionStore;
use crate::risk::RiskEngine;
use crate::strategy::Intent;

/// One coin's evaluator output, ready for priority sort and cap filtering.
pub struct CoinDecision {
    pub coin: String,
    pub intent: Intent,
    pub price: f64,
    pub atr_now: f64,
}

pub struct PortfolioManager {
    pub config: PortfolioConfig,
    pub positions: Arc<PositionStore>,
    pub risk: Arc<RiskEngine>,
    pub executor: Arc<Executor>,
}

impl PortfolioManager {
    /// Sort by dispatch priority, apply portfolio caps to `Enter`/`Pyramid`
    /// intents, then dispatch each accepted intent to the Executor in order.
    /// Exits are always dispatched regardless of caps.
    pub async fn run_cycle(&self, mut decisions: Vec<CoinDecision>, cycle_id: &str) {
        decisions.sort_by_key(|d| d.intent.priority());

        for decision in decisions {
            let CoinDecision {
                coin,
                intent,
                price,
                atr_now,
            } = decision;

            let is_new_risk = matches!(intent, Intent::Enter(_) | Intent::Pyramid(_));

            if is_new_risk {
                if let Some(reason) = self.check_caps() {
                    debug!(coin, reason, "new-risk intent blocked by portfolio cap");
                    continue;
                }
            }

            let outcome = self
                .executor
                .execute(&coin, &intent, price, atr_now, cycle_id)
                .await;

            info!(coin, intent_kind = intent.kind_label(), ?outcome, "cycle decision dispatched");
        }
    }

    /// Returns `Some(reason)` if dispatching another `Enter`/`Pyramid` this
    /// cycle would violate a portfolio-wide cap. `Executor` records each
    /// dispatched new-risk trade against `RiskEngine` synchronously, so
    /// `snapshot().trades_today` already reflects every trade dispatched
    /// earlier in this same cycle.
    fn check_caps(&self) -> Option<String> {
        let open_positions = self.positions.open_count() as u32;
        if open_positions >= self.config.max_positions {
            return Some(format!(
                "open_positions {open_positions} >= max_positions {}",
                self.config.max_positions
            ));
        }

        let trades_today = self.risk.snapshot().trades_today;
        if trades_today >= self.config.max_daily_trades {
            return Some(format!(
                "trades_today {trades_today} >= max_daily_trades {}",
                self.config.max_daily_trades
            ));
        }

        let (allowed, reason) = self.risk.can_open_new_risk();
        if !allowed {
            return reason;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_sort_with_exits_first() {
        let mut decisions = vec![
            CoinDecision {
                coin: "ETH".into(),
                intent: Intent::Hold,
                price: 100.0,
                atr_now: 1.0,
            },
            CoinDecision {
                coin: "BTC".into(),
                intent: Intent::FullExit("stop".into()),
                price: 100.0,
                atr_now: 1.0,
            },
            CoinDecision {
                coin: "XRP".into(),
                intent: Intent::Enter(1.0),
                price: 1.0,
                atr_now: 0.1,
            },
        ];
        decisions.sort_by_key(|d| d.intent.priority());
        assert_eq!(decisions[0].coin, "BTC");
        assert_eq!(decisions[1].coin, "XRP");
        assert_eq!(decisions[2].coin, "ETH");
    }
}
