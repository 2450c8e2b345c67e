//! Check that the remote store is reachable.

use anyhow::Result;
use snapsync_client::RemoteStore;
use std::path::Path;

use crate::config::AppConfig;

/// Run the check command.
pub async fn run(data_dir: &Path) -> Result<()> {
    let config = AppConfig::load(data_dir).await?;
    let engine = config.engine()?;

    let provider = engine.store().provider().to_string();
    println!("Checking {} remote...", provider);
    if !engine.check().await {
        anyhow::bail!("Remote {} is not reachable", provider);
    }
    println!("  Reachable");
    Ok(())
}
