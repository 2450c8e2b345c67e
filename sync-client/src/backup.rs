//! Local backup export and import.
//!
//! The offline path: the full snapshot as an uncompressed, indented JSON
//! document. Import merges it into live state with the same strategies a
//! sync cycle uses.

use std::path::{Path, PathBuf};

use chrono::Local;
use snapsync_core::{MergeContext, SnapshotMerge};
use snapsync_types::{now_millis, DomainKey, Snapshot, SyncError};
use thiserror::Error;
use tracing::info;

use crate::registry::{DomainRegistry, RegistryError};

/// Backup errors.
#[derive(Debug, Error)]
pub enum BackupError {
    /// File could not be read or written.
    #[error("backup I/O error on {path}: {source}")]
    Io {
        /// The backup file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File is not a snapshot document.
    #[error("invalid backup file: {0}")]
    Parse(#[source] SyncError),

    /// Snapshot could not be serialized.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] SyncError),

    /// Live state could not be read or written.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result of an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Domains the backup carried.
    pub domains: Vec<DomainKey>,
    /// The host must restart before the imported state takes full effect.
    pub restart_required: bool,
}

/// Backup file name for a local timestamp.
pub fn backup_file_name(at: chrono::DateTime<Local>) -> String {
    at.format("Backup-%Y-%m-%d_%H-%M-%S.json").to_string()
}

/// Write every registered domain to a timestamped file in `dir`.
pub async fn export_backup(registry: &DomainRegistry, dir: &Path) -> Result<PathBuf, BackupError> {
    let snapshot = registry.snapshot()?;
    let contents = snapshot.to_json_pretty().map_err(BackupError::Serialize)?;

    let path = dir.join(backup_file_name(Local::now()));
    let io_err = |source| BackupError::Io {
        path: path.clone(),
        source,
    };
    tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    tokio::fs::write(&path, contents).await.map_err(io_err)?;

    info!(path = %path.display(), domains = ?snapshot.keys(), "backup exported");
    Ok(path)
}

/// Merge a backup file into live state.
///
/// A file that does not parse leaves live state untouched.
pub async fn import_backup(
    registry: &DomainRegistry,
    merger: &dyn SnapshotMerge,
    path: &Path,
) -> Result<ImportReport, BackupError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let imported = Snapshot::from_json_bytes(&bytes).map_err(BackupError::Parse)?;

    let local = registry.snapshot()?;
    let merged = merger.merge(&local, &imported, &MergeContext::at(now_millis()));
    registry.apply(merged)?;

    let domains = imported.keys();
    info!(path = %path.display(), ?domains, "backup imported, restart required");
    Ok(ImportReport {
        domains,
        restart_required: true,
    })
}
