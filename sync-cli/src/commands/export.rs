//! Export local state to a backup file.

use anyhow::{Context, Result};
use snapsync_client::{export_backup, DomainRegistry};
use std::path::{Path, PathBuf};

use crate::config::load_state;

/// Run the export command. Writes into `out`, or `<data-dir>/backups`.
pub async fn run(data_dir: &Path, out: Option<&Path>) -> Result<PathBuf> {
    let state = load_state(data_dir).await?;
    let dir = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join("backups"));

    let registry = DomainRegistry::in_memory(state);
    let path = export_backup(&registry, &dir)
        .await
        .context("Failed to export backup")?;

    println!("Backup written to {}", path.display());
    Ok(path)
}
