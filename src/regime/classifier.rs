// =============================================================================
// Regime Classifier
// =============================================================================
//
// Classifies the current market into one of six regimes from EMA50/EMA200
// separation and ADX, plus a volatility label from ATR% vs its rolling
// average. Evaluated top-to-bottom, first match wins:
//
//   1. RANGING        — ADX < 20
//   2. STRONG BULLISH — (EMA50 - EMA200) / EMA200 > +5%
//   3. BULLISH        — in (+2%, +5%]
//   4. NEUTRAL        — in [-2%, +2%]
//   5. BEARISH        — in [-5%, -2%)
//   6. STRONG BEARISH — everything else
//
// A regime change only commits after two consecutive cycles agree; the
// classifier otherwise holds the last committed regime.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RegimeMinScores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketRegime {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
    Ranging,
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBullish => write!(f, "STRONG_BULLISH"),
            Self::Bullish => write!(f, "BULLISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::StrongBearish => write!(f, "STRONG_BEARISH"),
            Self::Ranging => write!(f, "RANGING"),
        }
    }
}

impl MarketRegime {
    /// Minimum entry score required in this regime, read from the live
    /// `[strategy.regime_min_scores]` config. `StrongBearish` never allows
    /// entries — there is no corresponding config field for it.
    pub fn min_entry_score(self, scores: &RegimeMinScores) -> Option<u8> {
        match self {
            Self::StrongBullish => Some(scores.strong_bullish),
            Self::Bullish => Some(scores.bullish),
            Self::Neutral => Some(scores.neutral),
            Self::Ranging => Some(scores.ranging),
            Self::Bearish => Some(scores.bearish),
            Self::StrongBearish => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Volatility {
    Low,
    Normal,
    High,
}

impl std::fmt::Display for Volatility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Normal => write!(f, "NORMAL"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeState {
    pub regime: MarketRegime,
    pub volatility: Volatility,
    pub ema50: f64,
    pub ema200: f64,
    pub adx: f64,
    pub atr_pct: f64,
    pub avg_atr_pct: f64,
}

/// Inputs the classifier needs for one cycle's classification.
#[derive(Debug, Clone, Copy)]
pub struct RegimeInputs {
    pub ema50: f64,
    pub ema200: f64,
    pub adx: f64,
    pub atr_pct: f64,
    pub avg_atr_pct: f64,
}

/// Determine the raw (un-hysteresis'd) regime from the top-down table.
fn classify_regime(ema50: f64, ema200: f64, adx: f64) -> MarketRegime {
    if adx < 20.0 {
        return MarketRegime::Ranging;
    }
    if ema200.abs() < 1e-12 {
        return MarketRegime::Neutral;
    }
    let rel = (ema50 - ema200) / ema200;
    if rel > 0.05 {
        MarketRegime::StrongBullish
    } else if rel > 0.02 {
        MarketRegime::Bullish
    } else if rel >= -0.02 {
        MarketRegime::Neutral
    } else if rel >= -0.05 {
        MarketRegime::Bearish
    } else {
        MarketRegime::StrongBearish
    }
}

fn classify_volatility(atr_pct: f64, avg_atr_pct: f64) -> Volatility {
    if avg_atr_pct.abs() < 1e-12 {
        return Volatility::Normal;
    }
    if atr_pct > 1.5 * avg_atr_pct {
        Volatility::High
    } else if atr_pct < 0.7 * avg_atr_pct {
        Volatility::Low
    } else {
        Volatility::Normal
    }
}

/// Per-coin cached classifier state with 2-cycle hysteresis on regime changes.
pub struct RegimeClassifier {
    committed: RwLock<Option<RegimeState>>,
    pending: RwLock<Option<MarketRegime>>,
    agree_count: RwLock<u8>,
}

impl RegimeClassifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            committed: RwLock::new(None),
            pending: RwLock::new(None),
            agree_count: RwLock::new(0),
        })
    }

    /// Classify one cycle's inputs and return the (possibly unchanged)
    /// committed regime state.
    pub fn classify(&self, inputs: RegimeInputs) -> RegimeState {
        let raw_regime = classify_regime(inputs.ema50, inputs.ema200, inputs.adx);
        let volatility = classify_volatility(inputs.atr_pct, inputs.avg_atr_pct);

        let committed_regime = self.committed.read().as_ref().map(|s| s.regime);

        let effective_regime = match committed_regime {
            None => {
                // First-ever classification commits immediately.
                *self.pending.write() = None;
                *self.agree_count.write() = 0;
                raw_regime
            }
            Some(current) if current == raw_regime => {
                // Already agrees with the committed regime; clear any pending flip.
                *self.pending.write() = None;
                *self.agree_count.write() = 0;
                current
            }
            Some(current) => {
                let mut pending = self.pending.write();
                let mut agree_count = self.agree_count.write();
                if *pending == Some(raw_regime) {
                    *agree_count += 1;
                } else {
                    *pending = Some(raw_regime);
                    *agree_count = 1;
                }
                if *agree_count >= 2 {
                    *pending = None;
                    *agree_count = 0;
                    raw_regime
                } else {
                    current
                }
            }
        };

        let state = RegimeState {
            regime: effective_regime,
            volatility,
            ema50: inputs.ema50,
            ema200: inputs.ema200,
            adx: inputs.adx,
            atr_pct: inputs.atr_pct,
            avg_atr_pct: inputs.avg_atr_pct,
        };

        debug!(
            regime = %effective_regime,
            raw_regime = %raw_regime,
            volatility = %volatility,
            adx = format!("{:.2}", inputs.adx),
            "regime classified"
        );

        *self.committed.write() = Some(state.clone());
        state
    }

    pub fn current(&self) -> Option<RegimeState> {
        self.committed.read().clone()
    }
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self {
            committed: RwLock::new(None),
            pending: RwLock::new(None),
            agree_count: RwLock::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(ema50: f64, ema200: f64, adx: f64) -> RegimeInputs {
        RegimeInputs {
            ema50,
            ema200,
            adx,
            atr_pct: 1.0,
            avg_atr_pct: 1.0,
        }
    }

    #[test]
    fn ranging_takes_priority_over_ema_spread() {
        // Even with a huge bullish EMA spread, low ADX means Ranging wins.
        assert_eq!(classify_regime(120.0, 100.0, 15.0), MarketRegime::Ranging);
    }

    #[test]
    fn strong_bullish_above_5_pct() {
        assert_eq!(classify_regime(106.0, 100.0, 30.0), MarketRegime::StrongBullish);
    }

    #[test]
    fn bullish_between_2_and_5_pct() {
        assert_eq!(classify_regime(103.0, 100.0, 30.0), MarketRegime::Bullish);
    }

    #[test]
    fn neutral_within_2_pct() {
        assert_eq!(classify_regime(101.0, 100.0, 30.0), MarketRegime::Neutral);
        assert_eq!(classify_regime(99.0, 100.0, 30.0), MarketRegime::Neutral);
    }

    #[test]
    fn bearish_between_minus_2_and_minus_5_pct() {
        assert_eq!(classify_regime(97.0, 100.0, 30.0), MarketRegime::Bearish);
    }

    #[test]
    fn strong_bearish_below_minus_5_pct() {
        assert_eq!(classify_regime(90.0, 100.0, 30.0), MarketRegime::StrongBearish);
    }

    #[test]
    fn volatility_labels() {
        assert_eq!(classify_volatility(2.0, 1.0), Volatility::High);
        assert_eq!(classify_volatility(0.5, 1.0), Volatility::Low);
        assert_eq!(classify_volatility(1.0, 1.0), Volatility::Normal);
    }

    #[test]
    fn min_entry_scores_use_default_config_values() {
        let scores = RegimeMinScores::default();
        assert_eq!(MarketRegime::StrongBullish.min_entry_score(&scores), Some(2));
        assert_eq!(MarketRegime::Bullish.min_entry_score(&scores), Some(3));
        assert_eq!(MarketRegime::Neutral.min_entry_score(&scores), Some(3));
        assert_eq!(MarketRegime::Ranging.min_entry_score(&scores), Some(3));
        assert_eq!(MarketRegime::Bearish.min_entry_score(&scores), Some(4));
        assert_eq!(MarketRegime::StrongBearish.min_entry_score(&scores), None);
    }

    #[test]
    fn min_entry_score_reflects_a_custom_config_override() {
        let scores = RegimeMinScores {
            strong_bullish: 1,
            bullish: 1,
            neutral: 4,
            ranging: 4,
            bearish: 4,
        };
        assert_eq!(MarketRegime::StrongBullish.min_entry_score(&scores), Some(1));
        assert_eq!(MarketRegime::Neutral.min_entry_score(&scores), Some(4));
    }

    #[test]
    fn first_classification_commits_immediately() {
        let clf = RegimeClassifier::default();
        let state = clf.classify(inputs(106.0, 100.0, 30.0));
        assert_eq!(state.regime, MarketRegime::StrongBullish);
    }

    #[test]
    fn single_disagreeing_cycle_does_not_flip() {
        let clf = RegimeClassifier::default();
        clf.classify(inputs(106.0, 100.0, 30.0)); // StrongBullish, committed
        let state = clf.classify(inputs(90.0, 100.0, 30.0)); // raw = StrongBearish
        assert_eq!(state.regime, MarketRegime::StrongBullish, "should hold until 2nd agreeing cycle");
    }

    #[test]
    fn two_consecutive_agreeing_cycles_flip_regime() {
        let clf = RegimeClassifier::default();
        clf.classify(inputs(106.0, 100.0, 30.0)); // StrongBullish
        clf.classify(inputs(90.0, 100.0, 30.0)); // 1st StrongBearish
        let state = clf.classify(inputs(90.0, 100.0, 30.0)); // 2nd StrongBearish => flip
        assert_eq!(state.regime, MarketRegime::StrongBearish);
    }

    #[test]
    fn interrupted_pending_resets_agree_count() {
        let clf = RegimeClassifier::default();
        clf.classify(inputs(106.0, 100.0, 30.0)); // StrongBullish committed
        clf.classify(inputs(90.0, 100.0, 30.0)); // pending StrongBearish, count=1
        clf.classify(inputs(101.0, 100.0, 30.0)); // pending Neutral, count reset to 1
        let state = clf.classify(inputs(90.0, 100.0, 30.0)); // pending StrongBearish again, count=1
        assert_eq!(state.regime, MarketRegime::StrongBullish, "count reset by the interruption");
    }
}
