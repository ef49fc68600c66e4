// =============================================================================
// Bithumb Core — Main Entry Point
// =============================================================================
//
// Wires the exchange client, candle buffer, regime classifiers, position
// store, risk engine, notification queue, and executor together, then hands
// the cycle loop to the scheduler. Config comes from `config.json` (falling
// back to defaults); credentials come from the environment.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod app_state;
mod config;
mod decision_envelope;
mod error;
mod exchange;
mod execution;
mod indicators;
mod market_data;
mod notification;
mod persistence;
mod portfolio;
mod position;
mod regime;
mod risk;
mod scheduler;
mod strategy;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::Config;
use crate::exchange::ExchangeClient;
use crate::execution::Executor;
use crate::market_data::CandleBuffer;
use crate::notification::{LoggingSink, NotificationEvent, NotificationQueue, DEFAULT_QUEUE_CAPACITY};
use crate::persistence::{load_daily_counters, TransactionLog};
use crate::portfolio::PortfolioManager;
use crate::position::PositionStore;
use crate::risk::RiskEngine;
use crate::scheduler::Scheduler;

const CONFIG_PATH: &str = "config.json";
const POSITIONS_PATH: &str = "positions.json";
const TRANSACTIONS_PATH: &str = "transactions.jsonl";
const DAILY_COUNTERS_PATH: &str = "daily_counters.json";
const DEFAULT_ACCOUNT_VALUE_KRW: f64 = 1_000_000.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("bithumb-core starting up");

    let mut config = Config::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        Config::default()
    });

    if let Ok(key) = std::env::var("BITHUMB_CONNECT_KEY") {
        config.exchange.connect_key = key;
    }
    if let Ok(secret) = std::env::var("BITHUMB_SECRET_KEY") {
        config.exchange.secret_key = secret;
    }

    info!(
        coins = ?config.portfolio.coins,
        dry_run = config.safety.dry_run,
        "configuration loaded"
    );

    // ── 2. Build exchange client, stores, and engines ────────────────────
    let exchange = Arc::new(ExchangeClient::new(
        config.exchange.connect_key.clone(),
        config.exchange.secret_key.clone(),
    ));

    let notifications = Arc::new(NotificationQueue::spawn(
        Arc::new(LoggingSink),
        DEFAULT_QUEUE_CAPACITY,
    ));

    let (position_store, positions_corruption) = PositionStore::load(POSITIONS_PATH);
    let positions = Arc::new(position_store);

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let (daily_counters, counters_corruption) = load_daily_counters(DAILY_COUNTERS_PATH, &today);
    for corruption in [positions_corruption, counters_corruption].into_iter().flatten() {
        warn!(error = %corruption, "state corruption on startup");
        notifications.send(NotificationEvent::Error {
            message: corruption.to_string(),
        });
    }

    let risk = Arc::new(RiskEngine::with_counters(
        DEFAULT_ACCOUNT_VALUE_KRW,
        config.portfolio.max_daily_loss_pct,
        config.safety.max_consecutive_losses,
        daily_counters,
    ));

    let transactions = Arc::new(TransactionLog::new(TRANSACTIONS_PATH));

    let executor = Arc::new(Executor {
        exchange: exchange.clone(),
        positions: positions.clone(),
        risk: risk.clone(),
        transactions: transactions.clone(),
        notifications: notifications.clone(),
        safety: config.safety.clone(),
        portfolio: config.portfolio.clone(),
        strategy: config.strategy.clone(),
    });

    let portfolio = PortfolioManager {
        config: config.portfolio.clone(),
        positions: positions.clone(),
        risk: risk.clone(),
        executor: executor.clone(),
    };

    let state = Arc::new(AppState {
        config,
        exchange,
        candles: Arc::new(CandleBuffer::new(app_state::MAX_CANDLES_PER_COIN)),
        regimes: RwLock::new(HashMap::new()),
        positions,
        risk,
        notifications,
        transactions,
        executor,
        portfolio,
        prev_stoch: RwLock::new(HashMap::new()),
        start_time: std::time::Instant::now(),
    });

    info!("subsystems wired, handing off to scheduler");

    // ── 3. Run the cycle loop until shutdown ─────────────────────────────
    Scheduler { state }.run().await;

    info!("bithumb-core shut down complete");
    Ok(())
}
