//! Wall-clock helper.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
///
/// All snapsync timestamps (`lastUpdate`, `lastUpdateTime`, `lastSyncTime`,
/// message `date`) use this unit. A clock set before 1970 reads as 0.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
