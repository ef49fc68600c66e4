// =============================================================================
// Strategy Evaluator (C4) — one coin + one snapshot -> one Intent
// =============================================================================

use serde::Serialize;

use crate::config::RegimeMinScores;
use crate::indicators::stochastic::{bullish_cross_in_oversold, StochasticValue};
use crate::position::{Position, ProfitTargetMode};
use crate::regime::MarketRegime;

use super::snapshot::IndicatorSnapshot;

/// Minimum favorable-price edge (as a fraction of the weighted average entry
/// price) required before a pyramid add is considered.
pub const PYRAMID_EPSILON: f64 = 0.003;

/// Per-entry size multipliers, indexed by `entry_count` before the add.
pub const ENTRY_SIZE_MULTIPLIERS: [f64; 3] = [1.0, 0.5, 0.25];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Intent {
    Enter(f64),
    Pyramid(f64),
    PartialExit(f64, String),
    FullExit(String),
    Hold,
}

impl Intent {
    /// Label used by `DecisionEnvelope` and log lines; stable across cycles.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Intent::Enter(_) => "enter",
            Intent::Pyramid(_) => "pyramid",
            Intent::PartialExit(_, _) => "partial_exit",
            Intent::FullExit(_) => "full_exit",
            Intent::Hold => "hold",
        }
    }

    /// Dispatch priority: lower sorts first. `FullExit > PartialExit >
    /// Pyramid > Enter > Hold`.
    pub fn priority(&self) -> u8 {
        match self {
            Intent::FullExit(_) => 0,
            Intent::PartialExit(_, _) => 1,
            Intent::Pyramid(_) => 2,
            Intent::Enter(_) => 3,
            Intent::Hold => 4,
        }
    }
}

/// Inputs the evaluator needs beyond the indicator snapshot: the most recent
/// closed bar's high/low (for stop/TP breach and chandelier checks) and the
/// previous cycle's stochastic value (for the %K/%D cross check).
pub struct EvaluatorInputs<'a> {
    pub snapshot: &'a IndicatorSnapshot,
    pub bar_low: f64,
    pub bar_high: f64,
    pub prev_stoch: Option<StochasticValue>,
    pub regime: MarketRegime,
    pub base_trade_krw: f64,
    pub max_pyramids: u8,
    pub regime_min_scores: &'a RegimeMinScores,
}

pub struct StrategyEvaluator;

impl StrategyEvaluator {
    /// Score the most recent bar against the three entry conditions. Returns 0-4.
    pub fn entry_score(inputs: &EvaluatorInputs) -> u8 {
        let mut score = 0u8;
        let snap = inputs.snapshot;

        if inputs.bar_low <= snap.bb_lower {
            score += 1;
        }
        if snap.rsi < 30.0 {
            score += 1;
        }
        if let Some(prev) = inputs.prev_stoch {
            let current = StochasticValue {
                k: snap.stoch_k,
                d: snap.stoch_d,
            };
            if bullish_cross_in_oversold(prev, current) {
                score += 2;
            }
        }
        score
    }

    /// Evaluate a coin that currently has no open position: emits `Enter` if
    /// the entry score clears the regime's minimum, else `Hold`.
    pub fn evaluate_no_position(inputs: &EvaluatorInputs) -> (Intent, u8) {
        let score = Self::entry_score(inputs);
        let Some(min_score) = inputs.regime.min_entry_score(inputs.regime_min_scores) else {
            return (Intent::Hold, score);
        };
        if score >= min_score {
            let qty_krw = inputs.base_trade_krw * ENTRY_SIZE_MULTIPLIERS[0];
            (Intent::Enter(qty_krw), score)
        } else {
            (Intent::Hold, score)
        }
    }

    /// Compute this cycle's TP1/TP2 for an open position.
    pub fn exit_targets(position: &Position, snapshot: &IndicatorSnapshot) -> (f64, f64) {
        match position.profit_target_mode {
            ProfitTargetMode::PercentBased => (
                position.avg_entry_price * (1.0 + position.tp1_pct / 100.0),
                position.avg_entry_price * (1.0 + position.tp2_pct / 100.0),
            ),
            ProfitTargetMode::BbBased => (snapshot.bb_mid, snapshot.bb_upper),
        }
    }

    /// Evaluate a coin with an open position: stop breach, TP1/TP2, regime
    /// flip to `StrongBearish`, pyramid opportunity, or `Hold` — in that
    /// priority order.
    pub fn evaluate_with_position(inputs: &EvaluatorInputs, position: &Position) -> (Intent, u8) {
        let score = Self::entry_score(inputs);
        let snap = inputs.snapshot;

        if inputs.bar_low <= position.chandelier_stop {
            return (Intent::FullExit("stop".to_string()), score);
        }

        if inputs.regime == MarketRegime::StrongBearish {
            return (Intent::FullExit("regime".to_string()), score);
        }

        let (tp1, tp2) = Self::exit_targets(position, snap);

        if !position.first_target_hit && inputs.bar_high >= tp1 {
            return (Intent::PartialExit(0.5, "tp1".to_string()), score);
        }

        if position.first_target_hit && !position.second_target_hit && inputs.bar_high >= tp2 {
            return (Intent::PartialExit(1.0, "tp2".to_string()), score);
        }

        if position.entry_count < inputs.max_pyramids {
            let edge = (position.avg_entry_price - inputs.bar_low) / position.avg_entry_price;
            if edge >= PYRAMID_EPSILON {
                let Some(min_score) = inputs.regime.min_entry_score(inputs.regime_min_scores) else {
                    return (Intent::Hold, score);
                };
                if score >= min_score {
                    let qty_krw = inputs.base_trade_krw
                        * ENTRY_SIZE_MULTIPLIERS[position.entry_count as usize
                            % ENTRY_SIZE_MULTIPLIERS.len()];
                    return (Intent::Pyramid(qty_krw), score);
                }
            }
        }

        (Intent::Hold, score)
    }

    /// Top-level entry point: dispatches on whether `position` is present.
    pub fn evaluate(inputs: &EvaluatorInputs, position: Option<&Position>) -> (Intent, u8) {
        match position {
            Some(pos) if pos.is_present() => Self::evaluate_with_position(inputs, pos),
            _ => Self::evaluate_no_position(inputs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_scores() -> RegimeMinScores {
        RegimeMinScores::default()
    }

    fn snapshot(rsi: f64, bb_lower: f64, stoch_k: f64, stoch_d: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            ma_short: 100.0,
            ma_long: 100.0,
            ema50: 100.0,
            ema200: 95.0,
            rsi,
            bb_upper: 110.0,
            bb_mid: 100.0,
            bb_lower,
            macd_line: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            atr: 2.0,
            atr_pct: 2.0,
            avg_atr_pct: 2.0,
            stoch_k,
            stoch_d,
            adx: 25.0,
            volume_ratio: 1.0,
        }
    }

    #[test]
    fn entry_score_sums_all_three_conditions() {
        let snap = snapshot(25.0, 105.0, 25.0, 22.0);
        let prev = StochasticValue { k: 15.0, d: 18.0 };
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 100.0,
            bar_high: 101.0,
            prev_stoch: Some(prev),
            regime: MarketRegime::Bullish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &default_scores(),
        };
        assert_eq!(StrategyEvaluator::entry_score(&inputs), 4);
    }

    #[test]
    fn no_position_enters_when_score_clears_regime_minimum() {
        let snap = snapshot(25.0, 105.0, 10.0, 8.0);
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 100.0,
            bar_high: 101.0,
            prev_stoch: None,
            regime: MarketRegime::Bullish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &default_scores(),
        };
        let (intent, score) = StrategyEvaluator::evaluate_no_position(&inputs);
        assert_eq!(score, 2);
        assert_eq!(intent, Intent::Hold);
    }

    #[test]
    fn regime_min_scores_config_override_changes_gating() {
        let snap = snapshot(25.0, 105.0, 10.0, 8.0);
        let lowered = RegimeMinScores {
            strong_bullish: 2,
            bullish: 2,
            neutral: 2,
            ranging: 2,
            bearish: 2,
        };
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 100.0,
            bar_high: 101.0,
            prev_stoch: None,
            regime: MarketRegime::Bullish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &lowered,
        };
        let (intent, score) = StrategyEvaluator::evaluate_no_position(&inputs);
        assert_eq!(score, 2);
        assert_eq!(intent, Intent::Enter(50_000.0));
    }

    #[test]
    fn strong_bearish_never_enters() {
        let snap = snapshot(10.0, 200.0, 5.0, 3.0);
        let prev = StochasticValue { k: 5.0, d: 10.0 };
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 100.0,
            bar_high: 101.0,
            prev_stoch: Some(prev),
            regime: MarketRegime::StrongBearish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &default_scores(),
        };
        let (intent, _) = StrategyEvaluator::evaluate_no_position(&inputs);
        assert_eq!(intent, Intent::Hold);
    }

    #[test]
    fn stop_breach_takes_priority_over_tp() {
        let snap = snapshot(50.0, 90.0, 50.0, 50.0);
        let mut position =
            Position::open("BTC", 0, 100.0, 1.0, 5.0, 3.0, ProfitTargetMode::PercentBased, 1.5, 2.5);
        position.chandelier_stop = 97.0;
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 96.0,
            bar_high: 103.0,
            prev_stoch: None,
            regime: MarketRegime::Bullish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &default_scores(),
        };
        let (intent, _) = StrategyEvaluator::evaluate_with_position(&inputs, &position);
        assert_eq!(intent, Intent::FullExit("stop".to_string()));
    }

    #[test]
    fn tp1_fires_before_first_target_hit() {
        let snap = snapshot(50.0, 90.0, 50.0, 50.0);
        let position =
            Position::open("BTC", 0, 100.0, 1.0, 5.0, 3.0, ProfitTargetMode::PercentBased, 1.5, 2.5);
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 99.0,
            bar_high: 102.0,
            prev_stoch: None,
            regime: MarketRegime::Bullish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &default_scores(),
        };
        let (intent, _) = StrategyEvaluator::evaluate_with_position(&inputs, &position);
        assert_eq!(intent, Intent::PartialExit(0.5, "tp1".to_string()));
    }

    #[test]
    fn tp2_fires_only_after_first_target_hit() {
        let snap = snapshot(50.0, 90.0, 50.0, 50.0);
        let mut position =
            Position::open("BTC", 0, 100.0, 1.0, 5.0, 3.0, ProfitTargetMode::PercentBased, 1.5, 2.5);
        position.first_target_hit = true;
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 101.0,
            bar_high: 103.0,
            prev_stoch: None,
            regime: MarketRegime::Bullish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &default_scores(),
        };
        let (intent, _) = StrategyEvaluator::evaluate_with_position(&inputs, &position);
        assert_eq!(intent, Intent::PartialExit(1.0, "tp2".to_string()));
    }

    #[test]
    fn regime_flip_to_strong_bearish_forces_full_exit() {
        let snap = snapshot(50.0, 90.0, 50.0, 50.0);
        let position =
            Position::open("BTC", 0, 100.0, 1.0, 5.0, 3.0, ProfitTargetMode::PercentBased, 1.5, 2.5);
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 99.0,
            bar_high: 99.5,
            prev_stoch: None,
            regime: MarketRegime::StrongBearish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &default_scores(),
        };
        let (intent, _) = StrategyEvaluator::evaluate_with_position(&inputs, &position);
        assert_eq!(intent, Intent::FullExit("regime".to_string()));
    }

    #[test]
    fn pyramid_requires_price_edge_and_score() {
        let snap = snapshot(25.0, 105.0, 25.0, 22.0);
        let prev = StochasticValue { k: 15.0, d: 18.0 };
        let position =
            Position::open("BTC", 0, 100.0, 1.0, 5.0, 3.0, ProfitTargetMode::PercentBased, 1.5, 2.5);
        let inputs = EvaluatorInputs {
            snapshot: &snap,
            bar_low: 98.0,
            bar_high: 99.0,
            prev_stoch: Some(prev),
            regime: MarketRegime::Bullish,
            base_trade_krw: 50_000.0,
            max_pyramids: 3,
            regime_min_scores: &default_scores(),
        };
        let (intent, _) = StrategyEvaluator::evaluate_with_position(&inputs, &position);
        assert_eq!(intent, Intent::Pyramid(50_000.0));
    }

    #[test]
    fn intent_priority_orders_full_exit_first() {
        let mut intents = vec![
            Intent::Hold,
            Intent::Enter(1.0),
            Intent::FullExit("stop".to_string()),
            Intent::Pyramid(1.0),
            Intent::PartialExit(0.5, "tp1".to_string()),
        ];
        intents.sort_by_key(|i| i.priority());
        assert_eq!(intents[0].kind_label(), "full_exit");
        assert_eq!(intents[1].kind_label(), "partial_exit");
        assert_eq!(intents[2].kind_label(), "pyramid");
        assert_eq!(intents[3].kind_label(), "enter");
        assert_eq!(intents[4].kind_label(), "hold");
    }
}
