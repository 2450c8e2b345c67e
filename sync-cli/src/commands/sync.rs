//! Run one sync cycle.

use anyhow::Result;
use snapsync_client::{RemoteStore, SyncEngine, SyncOutcome};
use std::path::Path;

use crate::config::AppConfig;

/// Run the sync command.
pub async fn run(data_dir: &Path) -> Result<()> {
    let mut config = AppConfig::load(data_dir).await?;
    let engine = config.engine()?;

    println!("Syncing with {}...", engine.store().provider());
    let outcome = engine.sync().await;
    report(&mut config, data_dir, &engine, outcome).await
}

/// Print the outcome and persist what the cycle produced.
///
/// State is saved even after a failure: a cycle that merged but failed to
/// upload has already changed local state.
pub async fn report<S: RemoteStore>(
    config: &mut AppConfig,
    data_dir: &Path,
    engine: &SyncEngine<S>,
    outcome: SyncOutcome,
) -> Result<()> {
    println!("  {}", outcome.notice());
    config.persist(data_dir, engine).await?;

    match outcome {
        SyncOutcome::Failed(e) => Err(anyhow::Error::new(e).context("Sync failed")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_settings, load_state, with_all_domains};
    use snapsync_client::{DomainRegistry, MemoryStore, StoreError, SyncOptions};
    use snapsync_types::{DomainState, LwwRecord, Snapshot};
    use tempfile::tempdir;

    fn seeded_config() -> AppConfig {
        AppConfig {
            settings: Default::default(),
            state: with_all_domains(Snapshot::from_states([DomainState::Config(
                LwwRecord::new().with("theme", "dark").with("lastUpdateTime", 5),
            )])),
        }
    }

    fn engine_for(config: &AppConfig, store: MemoryStore) -> SyncEngine<MemoryStore> {
        SyncEngine::new(
            store,
            DomainRegistry::in_memory(config.state.clone()),
            SyncOptions::default(),
        )
    }

    #[tokio::test]
    async fn sync_without_init_fails() {
        let dir = tempdir().unwrap();

        let result = run(dir.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn successful_cycle_persists_state_and_bookkeeping() {
        let dir = tempdir().unwrap();
        let mut config = seeded_config();
        let engine = engine_for(&config, MemoryStore::new());

        let outcome = engine.sync().await;
        report(&mut config, dir.path(), &engine, outcome)
            .await
            .unwrap();

        let settings = load_settings(dir.path()).await.unwrap();
        assert!(settings.last_sync_time > 0);
        assert_eq!(settings.last_provider, "memory");
        let state = load_state(dir.path()).await.unwrap();
        assert_eq!(state, config.state);
    }

    #[tokio::test]
    async fn failed_cycle_is_an_error_but_still_saves() {
        let dir = tempdir().unwrap();
        let mut config = seeded_config();
        let store = MemoryStore::new();
        store.fail_next_get(StoreError::Timeout);
        let engine = engine_for(&config, store);

        let outcome = engine.sync().await;
        let result = report(&mut config, dir.path(), &engine, outcome).await;

        assert!(result.is_err());
        assert!(dir.path().join("state.json").exists());
        let settings = load_settings(dir.path()).await.unwrap();
        assert_eq!(settings.last_sync_time, 0);
    }
}
