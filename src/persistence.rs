// =============================================================================
// Persistence (C10) — transaction log and daily counters, crash-safe writes
// =============================================================================
//
// `positions.json` is owned by `position::PositionStore`. This module owns
// the other two on-disk records: the append-only transaction
// journal and the daily counters snapshot, both written atomically.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::risk::DailyCounters;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub ts: i64,
    pub coin: String,
    pub side: String,
    pub qty: f64,
    pub price: f64,
    pub fee: f64,
    pub reason_code: String,
    pub order_id: String,
    pub cycle_id: String,
}

/// Append-only `transactions.jsonl` writer — never mutates or deletes prior
/// lines, only appends.
pub struct TransactionLog {
    path: PathBuf,
}

impl TransactionLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, record: &TransactionRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("failed to serialize transaction record")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open transaction log {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to transaction log {}", self.path.display()))?;
        file.sync_all().ok();
        Ok(())
    }
}

/// Load `daily_counters.json`, starting fresh (today, zeroed) if missing. A
/// corrupt file is quarantined alongside itself with a `.corrupt-<ts>`
/// suffix and reported as `CoreError::StateCorruption` for the caller to
/// surface as an alert.
pub fn load_daily_counters(
    path: impl AsRef<Path>,
    today: &str,
) -> (DailyCounters, Option<CoreError>) {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(counters) => (counters, None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "daily counters corrupt, starting fresh");
                let quarantined = quarantine_corrupt_file(path);
                let corruption = CoreError::StateCorruption {
                    path: quarantined.unwrap_or_else(|| path.display().to_string()),
                    message: e.to_string(),
                };
                (fresh_counters(today), Some(corruption))
            }
        },
        Err(_) => {
            warn!(path = %path.display(), "daily counters file missing, starting fresh");
            (fresh_counters(today), None)
        }
    }
}

/// Copy an unreadable file aside as `<path>.corrupt-<unix_ms>` so the
/// original bytes survive for forensic review. Returns the quarantine path
/// on success, or `None` if the copy itself failed (logged, not fatal).
fn quarantine_corrupt_file(path: &Path) -> Option<String> {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let quarantine_path = path.with_extension(format!("json.corrupt-{ts}"));
    match std::fs::copy(path, &quarantine_path) {
        Ok(_) => Some(quarantine_path.display().to_string()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to quarantine corrupt daily counters file");
            None
        }
    }
}

fn fresh_counters(today: &str) -> DailyCounters {
    DailyCounters {
        date: today.to_string(),
        trades_today: 0,
        realized_pnl_today: 0.0,
        consecutive_losses: 0,
    }
}

/// Atomic tmp + rename write of `daily_counters.json`.
pub fn save_daily_counters(path: impl AsRef<Path>, counters: &DailyCounters) -> Result<()> {
    let path = path.as_ref();
    let content =
        serde_json::to_string_pretty(counters).context("failed to serialize daily counters")?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &content)
        .with_context(|| format!("failed to write tmp daily counters {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename tmp daily counters to {}", path.display()))?;
    info!(path = %path.display(), "daily counters saved (atomic)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_log_appends_one_line_per_record() {
        let dir = std::env::temp_dir().join(format!("txlog_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("transactions.jsonl");
        let log = TransactionLog::new(&path);

        let record = TransactionRecord {
            ts: 1,
            coin: "BTC".into(),
            side: "buy".into(),
            qty: 1.0,
            price: 100.0,
            fee: 0.1,
            reason_code: "enter".into(),
            order_id: "abc".into(),
            cycle_id: "c1".into(),
        };
        log.append(&record).unwrap();
        log.append(&record).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_daily_counters_start_fresh() {
        let dir = std::env::temp_dir().join(format!("dc_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("daily_counters.json");

        let (counters, corruption) = load_daily_counters(&path, "2026-07-29");
        assert_eq!(counters.date, "2026-07-29");
        assert_eq!(counters.trades_today, 0);
        assert!(corruption.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn daily_counters_round_trip() {
        let dir = std::env::temp_dir().join(format!("dc_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("daily_counters.json");

        let counters = DailyCounters {
            date: "2026-07-29".into(),
            trades_today: 3,
            realized_pnl_today: -500.0,
            consecutive_losses: 1,
        };
        save_daily_counters(&path, &counters).unwrap();
        let (reloaded, corruption) = load_daily_counters(&path, "2026-07-29");
        assert_eq!(reloaded.trades_today, 3);
        assert_eq!(reloaded.realized_pnl_today, -500.0);
        assert!(corruption.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_daily_counters_are_quarantined_and_reported() {
        let dir = std::env::temp_dir().join(format!("dc_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("daily_counters.json");
        std::fs::write(&path, "not valid json").unwrap();

        let (counters, corruption) = load_daily_counters(&path, "2026-07-29");
        assert_eq!(counters.trades_today, 0);
        let corruption = corruption.expect("corrupt file should surface a CoreError");
        assert!(corruption.surfaced());
        let CoreError::StateCorruption { path: quarantine_path, .. } = corruption else {
            panic!("expected StateCorruption");
        };
        assert!(std::path::Path::new(&quarantine_path).exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
