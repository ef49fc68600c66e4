// =============================================================================
// Central application state — shared handles wired together at startup
// =============================================================================
//
// Every subsystem owns its interior mutability (`PositionStore`, `RiskEngine`,
// `RegimeClassifier` already wrap their state in `parking_lot::RwLock` or
// atomics); `AppState` just holds the `Arc`s the scheduler needs each cycle.
// There is no dashboard or WebSocket snapshot here — human-facing views are
// out of scope — it lives in a separate collaborator service.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::exchange::ExchangeClient;
use crate::execution::Executor;
use crate::indicators::stochastic::StochasticValue;
use crate::market_data::CandleBuffer;
use crate::notification::NotificationQueue;
use crate::persistence::TransactionLog;
use crate::portfolio::PortfolioManager;
use crate::position::PositionStore;
use crate::regime::RegimeClassifier;
use crate::risk::RiskEngine;

pub const MAX_CANDLES_PER_COIN: usize = 500;

/// Shared handles for one running engine instance.
pub struct AppState {
    pub config: Config,
    pub exchange: Arc<ExchangeClient>,
    pub candles: Arc<CandleBuffer>,
    pub regimes: RwLock<HashMap<String, Arc<RegimeClassifier>>>,
    pub positions: Arc<PositionStore>,
    pub risk: Arc<RiskEngine>,
    pub notifications: Arc<NotificationQueue>,
    pub transactions: Arc<TransactionLog>,
    pub executor: Arc<Executor>,
    pub portfolio: PortfolioManager,
    /// Previous cycle's stochastic value per coin, needed for the %K/%D
    /// bullish-cross-in-oversold entry condition.
    pub prev_stoch: RwLock<HashMap<String, StochasticValue>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a coin's regime classifier lazily, reusing it across cycles
    /// so the 2-cycle hysteresis in `RegimeClassifier::classify` persists.
    pub fn regime_for(&self, coin: &str) -> Arc<RegimeClassifier> {
        if let Some(existing) = self.regimes.read().get(coin) {
            return existing.clone();
        }
        let mut regimes = self.regimes.write();
        regimes
            .entry(coin.to_string())
            .or_insert_with(RegimeClassifier::new)
            .clone()
    }

    pub fn take_prev_stoch(&self, coin: &str) -> Option<StochasticValue> {
        self.prev_stoch.read().get(coin).copied()
    }

    pub fn set_prev_stoch(&self, coin: &str, value: StochasticValue) {
        self.prev_stoch.write().insert(coin.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regime_for_reuses_the_same_classifier_across_calls() {
        let regimes = RwLock::new(HashMap::new());
        regimes
            .write()
            .entry("BTC".to_string())
            .or_insert_with(RegimeClassifier::new);
        let first = regimes.read().get("BTC").unwrap().clone();
        let second = regimes.read().get("BTC").unwrap().clone();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
