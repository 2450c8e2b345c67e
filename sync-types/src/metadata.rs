//! Sync bookkeeping.

use serde::{Deserialize, Serialize};

/// Bookkeeping owned by the sync orchestrator.
///
/// Written only after a fully successful cycle (bootstrap, merge or repair
/// upload). A failed upload leaves it untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    /// Wall-clock of the last successful cycle (epoch millis, 0 = never).
    #[serde(default)]
    pub last_sync_time: i64,
    /// Provider used by the last successful cycle.
    #[serde(default)]
    pub last_provider: String,
}

impl SyncMetadata {
    /// Record a successful cycle.
    pub fn mark(&mut self, provider: &str, now: i64) {
        self.last_sync_time = now;
        self.last_provider = provider.to_string();
    }

    /// Whether any cycle has ever succeeded.
    pub fn has_synced(&self) -> bool {
        self.last_sync_time > 0
    }
}
