// =============================================================================
// Executor (C6) — applies an Intent to an exchange order and Position Store
// =============================================================================
//
// Order of operations matters: on order acknowledgment,
// Position Store is updated *before* any notification is emitted, so a crash
// between order ack and state update is recoverable via exchange order
// history on next startup.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{PortfolioConfig, SafetyConfig, StrategyConfig};
use crate::exchange::ExchangeClient;
use crate::notification::{NotificationEvent, NotificationQueue};
use crate::persistence::{TransactionLog, TransactionRecord};
use crate::position::{Position, PositionStore, ProfitTargetMode};
use crate::risk::RiskEngine;
use crate::strategy::Intent;

pub const DRY_RUN_ORDER_ID: &str = "DRY_RUN";
pub const MIN_TRADE_SIZE_KRW: f64 = 5_000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Executed { order_id: String },
    Blocked { reason: String },
    Skipped { reason: String },
}

pub struct Executor {
    pub exchange: Arc<ExchangeClient>,
    pub positions: Arc<PositionStore>,
    pub risk: Arc<RiskEngine>,
    pub transactions: Arc<TransactionLog>,
    pub notifications: Arc<NotificationQueue>,
    pub safety: SafetyConfig,
    pub portfolio: PortfolioConfig,
    pub strategy: StrategyConfig,
}

impl Executor {
    /// Execute one coin's `Intent` against the current cycle's price and
    /// ATR context. `cycle_id` tags the resulting transaction record.
    pub async fn execute(
        &self,
        coin: &str,
        intent: &Intent,
        price: f64,
        atr_now: f64,
        cycle_id: &str,
    ) -> ExecutionOutcome {
        match intent {
            Intent::Hold => ExecutionOutcome::Skipped {
                reason: "hold".to_string(),
            },
            Intent::Enter(qty_krw) => self.execute_enter(coin, *qty_krw, price, atr_now, cycle_id).await,
            Intent::Pyramid(qty_krw) => {
                self.execute_pyramid(coin, *qty_krw, price, cycle_id).await
            }
            Intent::PartialExit(fraction, reason) => {
                self.execute_partial_exit(coin, *fraction, reason, price, cycle_id)
                    .await
            }
            Intent::FullExit(reason) => self.execute_full_exit(coin, reason, price, cycle_id).await,
        }
    }

    fn preflight_new_risk(&self, qty_krw: f64) -> Option<String> {
        if self.safety.emergency_stop {
            return Some("emergency stop active".to_string());
        }
        if qty_krw < MIN_TRADE_SIZE_KRW {
            return Some(format!(
                "order size {qty_krw} below exchange minimum {MIN_TRADE_SIZE_KRW}"
            ));
        }
        let (allowed, reason) = self.risk.can_open_new_risk();
        if !allowed {
            return reason;
        }
        None
    }

    async fn execute_enter(
        &self,
        coin: &str,
        qty_krw: f64,
        price: f64,
        atr_now: f64,
        cycle_id: &str,
    ) -> ExecutionOutcome {
        if let Some(reason) = self.preflight_new_risk(qty_krw) {
            warn!(coin, reason = %reason, "enter blocked by preflight");
            return ExecutionOutcome::Blocked { reason };
        }

        let qty = qty_krw / price;
        let order_id = match self.place_buy(coin, qty_krw).await {
            Ok(id) => id,
            Err(reason) => return ExecutionOutcome::Blocked { reason },
        };

        let profit_target_mode = match self.strategy.profit_target_mode.as_str() {
            "bb_based" => ProfitTargetMode::BbBased,
            _ => ProfitTargetMode::PercentBased,
        };
        let position = Position::open(
            coin,
            now_ms(),
            price,
            qty,
            atr_now,
            self.strategy.chandelier_mult,
            profit_target_mode,
            self.strategy.tp1_pct,
            self.strategy.tp2_pct,
        );
        if let Err(e) = self.positions.upsert(coin, position) {
            warn!(coin, error = %e, "failed to persist new position");
        }
        self.risk.record_trade_opened();

        self.record_and_notify(
            coin,
            "buy",
            qty,
            price,
            "enter",
            &order_id,
            cycle_id,
            NotificationEvent::TradeOpened {
                coin: coin.to_string(),
                qty,
                price,
            },
        );

        ExecutionOutcome::Executed { order_id }
    }

    async fn execute_pyramid(
        &self,
        coin: &str,
        qty_krw: f64,
        price: f64,
        cycle_id: &str,
    ) -> ExecutionOutcome {
        if let Some(reason) = self.preflight_new_risk(qty_krw) {
            warn!(coin, reason = %reason, "pyramid blocked by preflight");
            return ExecutionOutcome::Blocked { reason };
        }

        let qty = qty_krw / price;
        let order_id = match self.place_buy(coin, qty_krw).await {
            Ok(id) => id,
            Err(reason) => return ExecutionOutcome::Blocked { reason },
        };

        let ts = now_ms();
        let result = self
            .positions
            .mutate(coin, |pos| pos.pyramid(ts, price, qty));
        if !matches!(result, Ok(Some(()))) {
            warn!(coin, "pyramid executed but no existing position found to update");
        }
        self.risk.record_trade_opened();

        self.record_and_notify(
            coin,
            "buy",
            qty,
            price,
            "pyramid",
            &order_id,
            cycle_id,
            NotificationEvent::TradeAdded {
                coin: coin.to_string(),
                qty,
                price,
            },
        );

        ExecutionOutcome::Executed { order_id }
    }

    async fn execute_partial_exit(
        &self,
        coin: &str,
        fraction: f64,
        reason: &str,
        price: f64,
        cycle_id: &str,
    ) -> ExecutionOutcome {
        let Some(existing) = self.positions.get(coin) else {
            return ExecutionOutcome::Skipped {
                reason: "no open position".to_string(),
            };
        };

        let exit_qty = existing.size * fraction;
        let order_id = match self.place_sell(coin, exit_qty).await {
            Ok(id) => id,
            Err(reason) => return ExecutionOutcome::Blocked { reason },
        };

        let mut realized_pnl = 0.0;
        let _ = self.positions.mutate(coin, |pos| {
            let consumption = pos.consume_fifo(exit_qty);
            for (lot_qty, lot_price) in &consumption.matches {
                realized_pnl += lot_qty * (price - lot_price);
            }

            if reason == "tp1" {
                pos.first_target_hit = true;
                pos.position_pct = 50.0;
                pos.lock_breakeven();
            } else if reason == "tp2" {
                pos.second_target_hit = true;
                pos.position_pct = 0.0;
            }
        });

        self.risk.record_trade_result(realized_pnl);

        if let Some(pos) = self.positions.get(coin) {
            if !pos.is_present() {
                let _ = self.positions.remove(coin);
            }
        }

        self.record_and_notify(
            coin,
            "sell",
            exit_qty,
            price,
            reason,
            &order_id,
            cycle_id,
            NotificationEvent::PartialExit {
                coin: coin.to_string(),
                fraction,
                reason: reason.to_string(),
            },
        );

        ExecutionOutcome::Executed { order_id }
    }

    async fn execute_full_exit(
        &self,
        coin: &str,
        reason: &str,
        price: f64,
        cycle_id: &str,
    ) -> ExecutionOutcome {
        let Some(existing) = self.positions.get(coin) else {
            return ExecutionOutcome::Skipped {
                reason: "no open position".to_string(),
            };
        };

        let exit_qty = existing.size;
        let order_id = match self.place_sell(coin, exit_qty).await {
            Ok(id) => id,
            Err(reason) => return ExecutionOutcome::Blocked { reason },
        };

        let mut realized_pnl = 0.0;
        let _ = self.positions.mutate(coin, |pos| {
            let consumption = pos.consume_fifo(exit_qty);
            for (lot_qty, lot_price) in &consumption.matches {
                realized_pnl += lot_qty * (price - lot_price);
            }
        });
        self.risk.record_trade_result(realized_pnl);
        let _ = self.positions.remove(coin);

        self.record_and_notify(
            coin,
            "sell",
            exit_qty,
            price,
            reason,
            &order_id,
            cycle_id,
            NotificationEvent::FullExit {
                coin: coin.to_string(),
                reason: reason.to_string(),
            },
        );

        ExecutionOutcome::Executed { order_id }
    }

    async fn place_buy(&self, coin: &str, qty_krw: f64) -> Result<String, String> {
        if self.safety.dry_run {
            return Ok(DRY_RUN_ORDER_ID.to_string());
        }
        self.exchange
            .market_buy(coin, qty_krw)
            .await
            .map(|ack| ack.order_id)
            .map_err(|e| e.to_string())
    }

    async fn place_sell(&self, coin: &str, qty: f64) -> Result<String, String> {
        if self.safety.dry_run {
            return Ok(DRY_RUN_ORDER_ID.to_string());
        }
        self.exchange
            .market_sell(coin, qty)
            .await
            .map(|ack| ack.order_id)
            .map_err(|e| e.to_string())
    }

    #[allow(clippy::too_many_arguments)]
    fn record_and_notify(
        &self,
        coin: &str,
        side: &str,
        qty: f64,
        price: f64,
        reason_code: &str,
        order_id: &str,
        cycle_id: &str,
        event: NotificationEvent,
    ) {
        let record = TransactionRecord {
            ts: now_ms(),
            coin: coin.to_string(),
            side: side.to_string(),
            qty,
            price,
            fee: 0.0,
            reason_code: reason_code.to_string(),
            order_id: order_id.to_string(),
            cycle_id: cycle_id.to_string(),
        };
        if let Err(e) = self.transactions.append(&record) {
            warn!(coin, error = %e, "failed to append transaction record");
        }
        info!(coin, side, qty, price, reason_code, order_id, "trade executed");
        self.notifications.send(event);
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as i64
}
