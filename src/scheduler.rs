// =============================================================================
// Scheduler (C8) — drives the cycle at a fixed period
// =============================================================================
//
// One task owns the cycle tick. Each step (fetch, indicators, regime,
// evaluate) is wrapped in its own per-step deadline so one coin's slow
// network call can't stall the rest of the cycle; the cycle itself has a
// hard ceiling at 80% of the tick period. Shutdown is a plain `ctrl_c()`
// race against the tick, exactly as the donor's `main.rs` does it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app_state::AppState;
use crate::decision_envelope::DecisionEnvelope;
use crate::error::CoreError;
use crate::market_data::CandleKey;
use crate::notification::NotificationEvent;
use crate::portfolio::CoinDecision;
use crate::regime::RegimeInputs;
use crate::strategy::{build_snapshot, EvaluatorInputs, StrategyEvaluator};

pub struct Scheduler {
    pub state: Arc<AppState>,
}

impl Scheduler {
    pub async fn run(self) {
        let cycle_period = Duration::from_secs(self.state.config.scheduler.cycle_period_sec);
        let mut ticker = tokio::time::interval(cycle_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        self.state.notifications.send(NotificationEvent::BotStarted);
        info!(cycle_period_sec = cycle_period.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cycle_id = uuid::Uuid::new_v4().to_string();
                    self.run_cycle(&cycle_id).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received, finishing in-flight work");
                    self.state.notifications.send(NotificationEvent::BotStopped);
                    break;
                }
            }
        }
    }

    async fn run_cycle(&self, cycle_id: &str) {
        let cycle_ceiling = Duration::from_secs(
            (self.state.config.scheduler.cycle_period_sec as f64 * 0.8) as u64,
        );
        let step_deadline = Duration::from_secs(self.state.config.scheduler.step_deadline_sec);
        let coins = self.state.config.portfolio.coins.clone();
        let interval = self.state.config.strategy.interval.clone();
        let warmup_bars = self.state.config.strategy.warmup_bars;

        let cycle_work = async {
            let mut decisions = Vec::with_capacity(coins.len());
            let mut coins_attempted = 0u32;
            let mut transient_failures = 0u32;
            for coin in &coins {
                coins_attempted += 1;
                match tokio::time::timeout(step_deadline, self.evaluate_coin(coin, &interval, warmup_bars))
                    .await
                {
                    Ok(Ok(Some(decision))) => decisions.push(decision),
                    Ok(Ok(None)) => {}
                    Ok(Err(err)) => {
                        if err.surfaced() {
                            warn!(coin, error = %err, "cycle step error surfaced");
                            self.state
                                .notifications
                                .send(NotificationEvent::Error { message: err.to_string() });
                        } else {
                            warn!(coin, error = %err, "cycle step error recovered locally, skipping this coin this cycle");
                        }
                        if matches!(err, CoreError::TransientExchange { .. }) {
                            transient_failures += 1;
                        }
                    }
                    Err(_) => {
                        warn!(coin, "cycle step timed out, skipping this coin this cycle");
                        transient_failures += 1;
                    }
                }
            }
            if coins_attempted > 0 && transient_failures == coins_attempted {
                warn!(cycle_id, "every coin failed transiently this cycle, surfacing alert");
                self.state.notifications.send(NotificationEvent::Error {
                    message: format!(
                        "all {coins_attempted} coins failed to evaluate this cycle (transient exchange errors or timeouts)"
                    ),
                });
            }
            decisions
        };

        let decisions = match tokio::time::timeout(cycle_ceiling, cycle_work).await {
            Ok(decisions) => decisions,
            Err(_) => {
                warn!(cycle_id, "cycle ceiling exceeded, dispatching partial results");
                Vec::new()
            }
        };

        let dispatched = decisions.len();
        self.state.portfolio.run_cycle(decisions, cycle_id).await;

        info!(
            cycle_id,
            coins_evaluated = dispatched,
            "cycle heartbeat"
        );
    }

    /// Fetch candles, compute indicators/regime, and ask the evaluator for an
    /// Intent for one coin. Returns `Ok(None)` if the coin isn't warmed up yet
    /// and has no confirmed candles; returns `Err` for exchange failures,
    /// classified per the cycle error taxonomy.
    async fn evaluate_coin(
        &self,
        coin: &str,
        interval: &str,
        warmup_bars: usize,
    ) -> Result<Option<CoinDecision>, CoreError> {
        let key = CandleKey::new(coin, interval);

        match self.state.exchange.get_candles(coin, interval, warmup_bars).await {
            Ok(polled) => self.state.candles.ingest(key.clone(), &polled),
            Err(source) => {
                return Err(if matches!(source, crate::error::ExchangeError::Auth { .. }) {
                    CoreError::Auth { source }
                } else {
                    CoreError::TransientExchange {
                        coin: coin.to_string(),
                        source,
                    }
                });
            }
        }

        let candles = self.state.candles.get_closed(&key);
        let Some(snapshot) = build_snapshot(&candles) else {
            return Ok(None);
        };
        let Some(last) = candles.last() else {
            return Ok(None);
        };

        let regime_state = self.state.regime_for(coin).classify(RegimeInputs {
            ema50: snapshot.ema50,
            ema200: snapshot.ema200,
            adx: snapshot.adx,
            atr_pct: snapshot.atr_pct,
            avg_atr_pct: snapshot.avg_atr_pct,
        });

        let prev_stoch = self.state.take_prev_stoch(coin);
        let _ = self
            .state
            .positions
            .mutate(coin, |pos| pos.update_chandelier(last.high, snapshot.atr));
        let position = self.state.positions.get(coin);

        let inputs = EvaluatorInputs {
            snapshot: &snapshot,
            bar_low: last.low,
            bar_high: last.high,
            prev_stoch,
            regime: regime_state.regime,
            base_trade_krw: self.state.config.portfolio.base_trade_krw,
            max_pyramids: self.state.config.portfolio.max_pyramids,
            regime_min_scores: &self.state.config.strategy.regime_min_scores,
        };
        let (intent, entry_score) = StrategyEvaluator::evaluate(&inputs, position.as_ref());

        self.state.set_prev_stoch(
            coin,
            crate::indicators::stochastic::StochasticValue {
                k: snapshot.stoch_k,
                d: snapshot.stoch_d,
            },
        );

        let envelope = DecisionEnvelope::new(
            coin,
            "chandelier_fifo_pyramid",
            &intent,
            regime_state.regime,
            Some(entry_score),
            format!("regime={} score={entry_score}", regime_state.regime),
        );
        info!(
            coin,
            intent_kind = envelope.intent_kind,
            regime = envelope.regime,
            entry_score,
            "decision evaluated"
        );

        Ok(Some(CoinDecision {
            coin: coin.to_string(),
            intent,
            price: last.close,
            atr_now: snapshot.atr,
        }))
    }
}
