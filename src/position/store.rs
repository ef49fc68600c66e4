// =============================================================================
// Position Store — durable `coin -> Position` map with atomic persistence
// =============================================================================
//
// Positions are mutated only by the Executor. Every mutation serializes the
// full map to a temp file in the same directory, fsyncs it, then atomically
// renames it over the live file.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::CoreError;

use super::position::Position;

pub struct PositionStore {
    positions: RwLock<HashMap<String, Position>>,
    path: PathBuf,
}

impl PositionStore {
    /// Load the map from `path`. A missing file starts empty. A corrupt file
    /// is preserved alongside itself with a `.corrupt-<ts>` suffix for
    /// forensic review, the store starts empty, and the returned
    /// `CoreError::StateCorruption` is the caller's cue to surface an alert.
    pub fn load(path: impl AsRef<Path>) -> (Self, Option<CoreError>) {
        let path = path.as_ref().to_path_buf();
        let (positions, corruption) = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => (map, None),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "positions file corrupt, starting empty");
                    let quarantined = quarantine_corrupt_file(&path);
                    (
                        HashMap::new(),
                        Some(CoreError::StateCorruption {
                            path: quarantined.unwrap_or_else(|| path.display().to_string()),
                            message: e.to_string(),
                        }),
                    )
                }
            },
            Err(_) => {
                warn!(path = %path.display(), "positions file missing, starting empty");
                (HashMap::new(), None)
            }
        };

        info!(path = %path.display(), count = positions.len(), "position store loaded");

        (
            Self {
                positions: RwLock::new(positions),
                path,
            },
            corruption,
        )
    }

    /// Atomic tmp + fsync + rename write of the full map.
    fn persist(&self, positions: &HashMap<String, Position>) -> Result<()> {
        let content = serde_json::to_string_pretty(positions)
            .context("failed to serialize positions map")?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)
                .with_context(|| format!("failed to create tmp file {}", tmp_path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("failed to write tmp file {}", tmp_path.display()))?;
            file.sync_all()
                .with_context(|| format!("failed to fsync tmp file {}", tmp_path.display()))?;
        }

        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp positions to {}", self.path.display()))?;

        Ok(())
    }

    pub fn get(&self, coin: &str) -> Option<Position> {
        self.positions.read().get(coin).cloned()
    }

    pub fn all(&self) -> HashMap<String, Position> {
        self.positions.read().clone()
    }

    pub fn open_count(&self) -> usize {
        self.positions.read().len()
    }

    /// Insert or replace `coin`'s position, then persist.
    pub fn upsert(&self, coin: &str, position: Position) -> Result<()> {
        let mut positions = self.positions.write();
        positions.insert(coin.to_string(), position);
        self.persist(&positions)
    }

    /// Remove `coin`'s position (full exit) and persist.
    pub fn remove(&self, coin: &str) -> Result<()> {
        let mut positions = self.positions.write();
        positions.remove(coin);
        self.persist(&positions)
    }

    /// Mutate `coin`'s position in place via `f`, then persist. Returns
    /// `None` if no position exists for `coin`.
    pub fn mutate<F, T>(&self, coin: &str, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Position) -> T,
    {
        let mut positions = self.positions.write();
        let Some(position) = positions.get_mut(coin) else {
            return Ok(None);
        };
        let result = f(position);
        self.persist(&positions)?;
        Ok(Some(result))
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
            warn!(path = %path.display(), error = %e, "failed to quarantine corrupt positions file");
            None
        }
    }
}
