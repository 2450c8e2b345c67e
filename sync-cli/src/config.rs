//! Data directory layout for the CLI host.
//!
//! The data directory holds two files:
//!
//! - `settings.json`: versioned sync settings (credentials included)
//! - `state.json`: the local application state as a snapshot document

use anyhow::{Context, Result};
use snapsync_client::{DomainRegistry, RemoteStore, SyncEngine, SyncSettings};
use snapsync_types::{
    ChatState, DomainKey, DomainState, LwwRecord, MaskState, PromptState, Snapshot,
};
use std::path::{Path, PathBuf};

/// Settings file name inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// State file name inside the data directory.
pub const STATE_FILE: &str = "state.json";

/// Path of the settings file.
pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

/// Path of the state file.
pub fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STATE_FILE)
}

/// Load sync settings. A missing file yields defaults.
pub async fn load_settings(data_dir: &Path) -> Result<SyncSettings> {
    SyncSettings::load(&settings_path(data_dir))
        .await
        .context("Failed to load sync settings")
}

/// Save sync settings.
pub async fn save_settings(data_dir: &Path, settings: &SyncSettings) -> Result<()> {
    settings
        .save(&settings_path(data_dir))
        .await
        .context("Failed to save sync settings")
}

/// Load local state. A missing file is an empty state. Every domain is
/// present in the result so a remote-only domain can be adopted.
pub async fn load_state(data_dir: &Path) -> Result<Snapshot> {
    let path = state_path(data_dir);
    let snapshot = match tokio::fs::read(&path).await {
        Ok(bytes) => Snapshot::from_json_bytes(&bytes)
            .with_context(|| format!("Invalid state file {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    Ok(with_all_domains(snapshot))
}

/// Save local state.
pub async fn save_state(data_dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let path = state_path(data_dir);
    let contents = snapshot
        .to_json_pretty()
        .context("Failed to serialize local state")?;
    tokio::fs::write(&path, contents)
        .await
        .context("Failed to save local state")?;
    set_file_permissions_0600(&path).await?;
    Ok(())
}

/// Fill in an empty state for every domain the snapshot lacks.
pub fn with_all_domains(mut snapshot: Snapshot) -> Snapshot {
    for key in DomainKey::ALL {
        if snapshot.contains(key) {
            continue;
        }
        snapshot.insert(match key {
            DomainKey::Chat => DomainState::Chat(ChatState::default()),
            DomainKey::Access => DomainState::Access(LwwRecord::new()),
            DomainKey::Config => DomainState::Config(LwwRecord::new()),
            DomainKey::Mask => DomainState::Mask(MaskState::default()),
            DomainKey::Prompt => DomainState::Prompt(PromptState::default()),
        });
    }
    snapshot
}

/// Settings and local state loaded together.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Sync settings.
    pub settings: SyncSettings,
    /// Local application state.
    pub state: Snapshot,
}

impl AppConfig {
    /// Load settings and state from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let settings = load_settings(data_dir).await?;
        let state = load_state(data_dir).await?;
        Ok(Self { settings, state })
    }

    /// Build an engine over the configured store, seeded with the loaded
    /// state and bookkeeping.
    pub fn engine(&self) -> Result<SyncEngine<Box<dyn RemoteStore>>> {
        if !self.settings.is_configured() {
            anyhow::bail!("Sync is not configured. Run 'snapsync init' first.");
        }
        let store = self
            .settings
            .open_store()
            .context("Failed to open remote store")?;
        Ok(SyncEngine::new(
            store,
            DomainRegistry::in_memory(self.state.clone()),
            self.settings.sync_options(),
        )
        .with_metadata(self.settings.metadata()))
    }

    /// Take the engine's state and bookkeeping, then save both files.
    pub async fn persist<S: RemoteStore>(
        &mut self,
        data_dir: &Path,
        engine: &SyncEngine<S>,
    ) -> Result<()> {
        self.state = engine
            .registry()
            .snapshot()
            .context("Failed to read local state")?;
        self.settings.record_metadata(&engine.metadata());
        save_state(data_dir, &self.state).await?;
        save_settings(data_dir, &self.settings).await
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
