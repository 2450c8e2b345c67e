//! Merge a backup file into local state.

use anyhow::{Context, Result};
use snapsync_client::{import_backup, DomainRegistry, ImportReport};
use snapsync_core::DomainMerger;
use std::path::Path;

use crate::config::{load_state, save_state};

/// Run the import command.
pub async fn run(data_dir: &Path, file: &Path) -> Result<ImportReport> {
    let state = load_state(data_dir).await?;
    let registry = DomainRegistry::in_memory(state);

    let report = import_backup(&registry, &DomainMerger, file)
        .await
        .with_context(|| format!("Failed to import {}", file.display()))?;
    let merged = registry.snapshot().context("Failed to read local state")?;
    save_state(data_dir, &merged).await?;

    let domains: Vec<&str> = report.domains.iter().map(|d| d.as_str()).collect();
    println!("Imported: {}", domains.join(", "));
    if report.restart_required {
        println!("Restart any running host to pick up the imported state.");
    }
    Ok(report)
}
