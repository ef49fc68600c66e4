// =============================================================================
// Configuration surface (replaces runtime_config.rs)
// =============================================================================
//
// Every field carries `#[serde(default)]` so adding new fields never breaks
// loading an older config file. Persistence uses the same atomic tmp +
// rename pattern as the donor's `RuntimeConfig`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_coins() -> Vec<String> {
    vec!["BTC".to_string(), "ETH".to_string(), "XRP".to_string()]
}

fn default_rate_limit_rps() -> u32 {
    20
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_max_positions() -> u32 {
    2
}

fn default_max_daily_trades() -> u32 {
    10
}

fn default_max_daily_loss_pct() -> f64 {
    0.03
}

fn default_base_trade_krw() -> f64 {
    50_000.0
}

fn default_max_pyramids() -> u8 {
    3
}

fn default_interval() -> String {
    "5m".to_string()
}

fn default_warmup_bars() -> usize {
    200
}

fn default_chandelier_mult() -> f64 {
    3.0
}

fn default_profit_target_mode() -> String {
    "percent_based".to_string()
}

fn default_tp1_pct() -> f64 {
    1.5
}

fn default_tp2_pct() -> f64 {
    2.5
}

fn default_signal_threshold() -> f64 {
    0.5
}

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_max_consecutive_losses() -> u32 {
    5
}

fn default_cycle_period_sec() -> u64 {
    900
}

fn default_call_deadline_sec() -> u64 {
    15
}

fn default_step_deadline_sec() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub connect_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            connect_key: String::new(),
            secret_key: String::new(),
            rate_limit_rps: default_rate_limit_rps(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    #[serde(default = "default_coins")]
    pub coins: Vec<String>,
    #[serde(default = "default_max_positions")]
    pub max_positions: u32,
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
    #[serde(default = "default_max_daily_loss_pct")]
    pub max_daily_loss_pct: f64,
    #[serde(default = "default_base_trade_krw")]
    pub base_trade_krw: f64,
    #[serde(default = "default_max_pyramids")]
    pub max_pyramids: u8,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            coins: default_coins(),
            max_positions: default_max_positions(),
            max_daily_trades: default_max_daily_trades(),
            max_daily_loss_pct: default_max_daily_loss_pct(),
            base_trade_krw: default_base_trade_krw(),
            max_pyramids: default_max_pyramids(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalWeights {
    #[serde(default = "default_signal_threshold")]
    pub macd: f64,
    #[serde(default = "default_signal_threshold")]
    pub ma: f64,
    #[serde(default = "default_signal_threshold")]
    pub rsi: f64,
    #[serde(default = "default_signal_threshold")]
    pub bb: f64,
    #[serde(default = "default_signal_threshold")]
    pub volume: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            macd: default_signal_threshold(),
            ma: default_signal_threshold(),
            rsi: default_signal_threshold(),
            bb: default_signal_threshold(),
            volume: default_signal_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeMinScores {
    #[serde(default = "strong_bullish_default")]
    pub strong_bullish: u8,
    #[serde(default = "bullish_default")]
    pub bullish: u8,
    #[serde(default = "bullish_default")]
    pub neutral: u8,
    #[serde(default = "bullish_default")]
    pub ranging: u8,
    #[serde(default = "bearish_default")]
    pub bearish: u8,
}

fn strong_bullish_default() -> u8 {
    2
}
fn bullish_default() -> u8 {
    3
}
fn bearish_default() -> u8 {
    4
}

impl Default for RegimeMinScores {
    fn default() -> Self {
        Self {
            strong_bullish: strong_bullish_default(),
            bullish: bullish_default(),
            neutral: bullish_default(),
            ranging: bullish_default(),
            bearish: bearish_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_warmup_bars")]
    pub warmup_bars: usize,
    #[serde(default = "default_chandelier_mult")]
    pub chandelier_mult: f64,
    #[serde(default = "default_profit_target_mode")]
    pub profit_target_mode: String,
    #[serde(default = "default_tp1_pct")]
    pub tp1_pct: f64,
    #[serde(default = "default_tp2_pct")]
    pub tp2_pct: f64,
    #[serde(default)]
    pub weights: SignalWeights,
    #[serde(default = "default_signal_threshold")]
    pub signal_threshold: f64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub regime_min_scores: RegimeMinScores,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            warmup_bars: default_warmup_bars(),
            chandelier_mult: default_chandelier_mult(),
            profit_target_mode: default_profit_target_mode(),
            tp1_pct: default_tp1_pct(),
            tp2_pct: default_tp2_pct(),
            weights: SignalWeights::default(),
            signal_threshold: default_signal_threshold(),
            confidence_threshold: default_confidence_threshold(),
            regime_min_scores: RegimeMinScores::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub emergency_stop: bool,
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
}

fn default_true() -> bool {
    true
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            emergency_stop: false,
            max_consecutive_losses: default_max_consecutive_losses(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_cycle_period_sec")]
    pub cycle_period_sec: u64,
    #[serde(default = "default_call_deadline_sec")]
    pub call_deadline_sec: u64,
    #[serde(default = "default_step_deadline_sec")]
    pub step_deadline_sec: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_period_sec: default_cycle_period_sec(),
            call_deadline_sec: default_call_deadline_sec(),
            step_deadline_sec: default_step_deadline_sec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        info!(path = %path.display(), coins = ?config.portfolio.coins, "config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using atomic tmp + rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("failed to serialize config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = Config::default();
        assert_eq!(config.portfolio.coins, vec!["BTC", "ETH", "XRP"]);
        assert_eq!(config.portfolio.max_positions, 2);
        assert_eq!(config.portfolio.max_daily_trades, 10);
        assert_eq!(config.portfolio.max_pyramids, 3);
        assert_eq!(config.strategy.chandelier_mult, 3.0);
        assert_eq!(config.strategy.regime_min_scores.strong_bullish, 2);
        assert_eq!(config.strategy.regime_min_scores.bearish, 4);
        assert!(config.safety.dry_run);
    }

    #[test]
    fn round_trips_through_json() {
        let dir = std::env::temp_dir().join(format!("cfg_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let config = Config::default();
        config.save(&path).unwrap();
        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.portfolio.coins, config.portfolio.coins);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("cfg_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.portfolio.max_positions, 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
