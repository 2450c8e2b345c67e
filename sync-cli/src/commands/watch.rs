//! Run auto-sync until interrupted.

use anyhow::{Context, Result};
use snapsync_client::{AutoSync, RemoteStore, SyncEngine, SyncOutcome};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Run the watch command.
pub async fn run(data_dir: &Path, interval_secs: Option<u64>) -> Result<()> {
    let mut config = AppConfig::load(data_dir).await?;
    let engine = Arc::new(config.engine()?);
    let period = interval_secs
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.settings.auto_sync_interval());

    println!(
        "Auto-sync with {} every {}s. Press Ctrl-C to stop.",
        engine.store().provider(),
        period.as_secs()
    );

    let (worker, outcomes) = AutoSync::start(Arc::clone(&engine), period);
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")
    };
    let result = watch_outcomes(&mut config, data_dir, &*engine, outcomes, shutdown).await;

    worker.stop().await;
    config.persist(data_dir, &*engine).await?;
    println!("Stopped.");
    result
}

/// Persist after every outcome until `shutdown` resolves or the worker
/// exits.
async fn watch_outcomes<S, F>(
    config: &mut AppConfig,
    data_dir: &Path,
    engine: &SyncEngine<S>,
    mut outcomes: Receiver<SyncOutcome>,
    shutdown: F,
) -> Result<()>
where
    S: RemoteStore,
    F: std::future::Future<Output = Result<()>>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            outcome = outcomes.recv() => {
                let Some(outcome) = outcome else {
                    warn!("auto-sync worker exited");
                    return Ok(());
                };
                println!("  {}", outcome.notice());
                if let Err(e) = config.persist(data_dir, engine).await {
                    warn!(error = %e, "failed to persist after cycle");
                }
            }
            signal = &mut shutdown => {
                info!("shutdown requested");
                return signal;
            }
        }
    }
}
