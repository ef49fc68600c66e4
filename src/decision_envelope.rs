// =============================================================================
// Decision Envelope — auditable record of every per-coin evaluator decision
// =============================================================================
//
// Every cycle, the Strategy Evaluator produces exactly one Intent per coin.
// The envelope captures the regime, entry score, and reasoning behind that
// Intent so it can be inspected after the fact — the same role the donor's
// multi-layer verdict record played, collapsed to a single
// evaluation layer.

use serde::Serialize;

use crate::regime::MarketRegime;
use crate::strategy::evaluator::Intent;

#[derive(Debug, Clone, Serialize)]
pub struct DecisionEnvelope {
    pub id: String,
    pub coin: String,
    pub strategy_name: String,
    pub intent_kind: String,
    pub regime: String,
    pub entry_score: Option<u8>,
    pub reason: String,
    pub created_at: String,
}

impl DecisionEnvelope {
    pub fn new(
        coin: impl Into<String>,
        strategy_name: impl Into<String>,
        intent: &Intent,
        regime: MarketRegime,
        entry_score: Option<u8>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            coin: coin.into(),
            strategy_name: strategy_name.into(),
            intent_kind: intent.kind_label().to_string(),
            regime: regime.to_string(),
            entry_score,
            reason: reason.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
