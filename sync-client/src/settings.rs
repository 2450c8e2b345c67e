//! Versioned sync settings.
//!
//! Persisted as `{"version": N, "state": {...}}`. Older documents are
//! migrated field by field on the raw JSON before typed deserialization,
//! so a migration can touch fields the current struct no longer has.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use snapsync_core::{ChunkPolicy, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_PAYLOAD, DEFAULT_MAX_RETRIES};
use snapsync_types::{DomainKey, SyncMetadata};
use thiserror::Error;
use tracing::{debug, info};

use crate::engine::SyncOptions;
use crate::store::{
    RemoteStore, StoreError, UpstashConfig, UpstashStore, WebDavConfig, WebDavStore,
};

/// Current schema version.
pub const SETTINGS_VERSION: u32 = 3;

/// Relay default shipped before version 3; no longer valid.
const LEGACY_PROXY_URL: &str = "/api/cors/";

/// Settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path to the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the settings file.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path to the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Settings document is not valid.
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// Written by a newer build.
    #[error("settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the document.
        found: u64,
        /// Newest version this build reads.
        supported: u32,
    },
}

/// Which remote store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// WebDAV server.
    #[default]
    WebDav,
    /// Upstash Redis REST.
    Upstash,
}

impl Provider {
    /// Provider name as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::WebDav => "webdav",
            Provider::Upstash => "upstash",
        }
    }
}

/// WebDAV credentials.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebDavCredentials {
    /// Server base URL.
    pub endpoint: String,
    /// Basic auth user.
    pub username: String,
    /// Basic auth password.
    pub password: String,
}

impl std::fmt::Debug for WebDavCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavCredentials")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Upstash credentials.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstashCredentials {
    /// REST endpoint.
    pub endpoint: String,
    /// Key namespace.
    pub username: String,
    /// REST token.
    pub api_key: String,
}

impl std::fmt::Debug for UpstashCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstashCredentials")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Local sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Selected remote store.
    #[serde(default)]
    pub provider: Provider,
    /// Route requests through the relay.
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
    /// Relay base URL. Empty means direct even when `use_proxy` is set.
    #[serde(default)]
    pub proxy_url: String,
    /// WebDAV credentials.
    #[serde(default)]
    pub webdav: WebDavCredentials,
    /// Upstash credentials.
    #[serde(default = "default_upstash")]
    pub upstash: UpstashCredentials,

    /// Wall-clock of the last successful cycle (epoch millis, 0 = never).
    #[serde(default)]
    pub last_sync_time: i64,
    /// Provider used by the last successful cycle.
    #[serde(default)]
    pub last_provider: String,

    /// Blob name inside the folder.
    #[serde(default = "default_remote_key")]
    pub remote_key: String,
    /// Remote folder (WebDAV) or default namespace (Upstash).
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Upload window in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Extra attempts per chunk.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Hard cap on an upload in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Per-request time budget in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Auto-sync period in seconds.
    #[serde(default = "default_auto_sync_interval_secs")]
    pub auto_sync_interval_secs: u64,
    /// Run the scheduler in the host process.
    #[serde(default)]
    pub auto_sync_enabled: bool,
    /// Domains kept out of uploads.
    #[serde(default)]
    pub excluded_domains: Vec<DomainKey>,
}

fn default_use_proxy() -> bool {
    true
}

fn default_remote_key() -> String {
    "backup.json".to_string()
}

fn default_folder() -> String {
    "snapsync".to_string()
}

fn default_upstash() -> UpstashCredentials {
    UpstashCredentials {
        username: default_folder(),
        ..UpstashCredentials::default()
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_auto_sync_interval_secs() -> u64 {
    300
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            use_proxy: default_use_proxy(),
            proxy_url: String::new(),
            webdav: WebDavCredentials::default(),
            upstash: default_upstash(),
            last_sync_time: 0,
            last_provider: String::new(),
            remote_key: default_remote_key(),
            folder: default_folder(),
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
            auto_sync_interval_secs: default_auto_sync_interval_secs(),
            auto_sync_enabled: false,
            excluded_domains: Vec::new(),
        }
    }
}

impl SyncSettings {
    /// Load settings, migrating older documents. A missing file yields
    /// defaults.
    pub async fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_document(&contents)
    }

    /// Parse a persisted document, running migrations.
    pub fn from_document(contents: &str) -> Result<Self, SettingsError> {
        let mut doc: Value = serde_json::from_str(contents)?;
        let version = doc.get("version").and_then(Value::as_u64).unwrap_or(0);
        if version > u64::from(SETTINGS_VERSION) {
            return Err(SettingsError::UnsupportedVersion {
                found: version,
                supported: SETTINGS_VERSION,
            });
        }

        let mut state = doc
            .get_mut("state")
            .map(Value::take)
            .unwrap_or_else(|| json!({}));
        if version < u64::from(SETTINGS_VERSION) {
            info!(from = version, to = SETTINGS_VERSION, "migrating sync settings");
            migrate(&mut state, version);
        }
        default_upstash_namespace(&mut state);
        Ok(serde_json::from_value(state)?)
    }

    /// Serialize as a versioned document.
    pub fn to_document(&self) -> Result<String, SettingsError> {
        let doc = json!({
            "version": SETTINGS_VERSION,
            "state": self,
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Save as a versioned document readable only by the owner.
    pub async fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(path, self.to_document()?)
            .await
            .map_err(write_err)?;
        set_file_permissions_0600(path).await.map_err(write_err)?;
        Ok(())
    }

    /// Whether every credential of the selected provider is filled in.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            Provider::WebDav => [
                &self.webdav.endpoint,
                &self.webdav.username,
                &self.webdav.password,
            ]
            .iter()
            .all(|v| !v.is_empty()),
            Provider::Upstash => [
                &self.upstash.endpoint,
                &self.upstash.username,
                &self.upstash.api_key,
            ]
            .iter()
            .all(|v| !v.is_empty()),
        }
    }

    /// Relay base URL, if requests should be forwarded.
    pub fn relay(&self) -> Option<String> {
        (self.use_proxy && !self.proxy_url.is_empty()).then(|| self.proxy_url.clone())
    }

    /// Per-request time budget.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Auto-sync period.
    pub fn auto_sync_interval(&self) -> Duration {
        Duration::from_secs(self.auto_sync_interval_secs.max(1))
    }

    /// Upload policy derived from the tunables.
    pub fn chunk_policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            chunk_size: self.chunk_size,
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_payload: self.max_payload_bytes,
            ..ChunkPolicy::default()
        }
    }

    /// Orchestrator options derived from the tunables.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            remote_key: self.remote_key.clone(),
            excluded_domains: self.excluded_domains.clone(),
        }
    }

    /// Bookkeeping carried in the settings document.
    pub fn metadata(&self) -> SyncMetadata {
        SyncMetadata {
            last_sync_time: self.last_sync_time,
            last_provider: self.last_provider.clone(),
        }
    }

    /// Copy bookkeeping back after a cycle.
    pub fn record_metadata(&mut self, metadata: &SyncMetadata) {
        self.last_sync_time = metadata.last_sync_time;
        self.last_provider = metadata.last_provider.clone();
    }

    /// Build the store for the selected provider.
    pub fn open_store(&self) -> Result<Box<dyn RemoteStore>, StoreError> {
        match self.provider {
            Provider::WebDav => Ok(Box::new(WebDavStore::new(WebDavConfig {
                endpoint: self.webdav.endpoint.clone(),
                username: self.webdav.username.clone(),
                password: self.webdav.password.clone(),
                folder: self.folder.clone(),
                relay: self.relay(),
                timeout: self.request_timeout(),
                policy: self.chunk_policy(),
            })?)),
            Provider::Upstash => Ok(Box::new(UpstashStore::new(UpstashConfig {
                endpoint: self.upstash.endpoint.clone(),
                username: self.upstash.username.clone(),
                api_key: self.upstash.api_key.clone(),
                probe_key: self.remote_key.clone(),
                relay: self.relay(),
                timeout: self.request_timeout(),
                policy: self.chunk_policy(),
            })?)),
        }
    }
}

/// Bring a raw `state` object from `from` up to [`SETTINGS_VERSION`].
fn migrate(state: &mut Value, from: u64) {
    let Some(obj) = state.as_object_mut() else {
        return;
    };

    if from < 2 {
        let folder = obj
            .get("folder")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(default_folder);
        let upstash = obj.entry("upstash").or_insert_with(|| json!({}));
        if let Some(upstash) = upstash.as_object_mut() {
            upstash.insert("username".to_string(), Value::String(folder));
        }
    }

    if from < 3 && obj.get("proxyUrl").and_then(Value::as_str) == Some(LEGACY_PROXY_URL) {
        obj.insert("proxyUrl".to_string(), Value::String(String::new()));
    }
}

/// A document without an `upstash` block namespaces by its own folder.
fn default_upstash_namespace(state: &mut Value) {
    let Some(obj) = state.as_object_mut() else {
        return;
    };
    if obj.contains_key("upstash") {
        return;
    }
    let folder = obj
        .get("folder")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(default_folder);
    obj.insert("upstash".to_string(), json!({ "username": folder }));
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn configured() -> SyncSettings {
        SyncSettings {
            webdav: WebDavCredentials {
                endpoint: "https://dav.example.com".into(),
                username: "alice".into(),
                password: "secret".into(),
            },
            ..SyncSettings::default()
        }
    }

    // ===========================================
    // Defaults Tests
    // ===========================================

    #[test]
    fn defaults_match_documented_values() {
        let s = SyncSettings::default();
        assert_eq!(s.provider, Provider::WebDav);
        assert!(s.use_proxy);
        assert_eq!(s.remote_key, "backup.json");
        assert_eq!(s.chunk_size, 1024 * 1024);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.auto_sync_interval(), Duration::from_secs(300));
        assert_eq!(s.upstash.username, "snapsync");
        assert!(!s.auto_sync_enabled);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let s = SyncSettings::from_document(r#"{"version":3,"state":{"provider":"upstash"}}"#)
            .unwrap();
        assert_eq!(s.provider, Provider::Upstash);
        assert_eq!(s.request_timeout_secs, 30);
        assert!(s.use_proxy);
    }

    #[test]
    fn empty_current_document_equals_defaults() {
        let s = SyncSettings::from_document(r#"{"version":3,"state":{}}"#).unwrap();
        assert_eq!(s, SyncSettings::default());
    }

    #[test]
    fn missing_upstash_block_keeps_folder_namespace() {
        let s = SyncSettings::from_document(r#"{"version":3,"state":{"provider":"upstash"}}"#)
            .unwrap();
        assert_eq!(s.upstash.username, SyncSettings::default().upstash.username);
        assert_eq!(s.upstash.username, "snapsync");

        let s = SyncSettings::from_document(
            r#"{"version":3,"state":{"provider":"upstash","folder":"team"}}"#,
        )
        .unwrap();
        assert_eq!(s.upstash.username, "team");
    }

    #[test]
    fn is_configured_checks_selected_provider() {
        assert!(!SyncSettings::default().is_configured());
        assert!(configured().is_configured());

        let upstash = SyncSettings {
            provider: Provider::Upstash,
            ..configured()
        };
        assert!(!upstash.is_configured());
    }

    #[test]
    fn relay_requires_flag_and_url() {
        let mut s = configured();
        assert_eq!(s.relay(), None);

        s.proxy_url = "https://relay.example.com".into();
        assert_eq!(s.relay().as_deref(), Some("https://relay.example.com"));

        s.use_proxy = false;
        assert_eq!(s.relay(), None);
    }

    // ===========================================
    // Migration Tests
    // ===========================================

    #[test]
    fn v1_resets_upstash_username_to_folder() {
        let doc = r#"{"version":1,"state":{"upstash":{"endpoint":"e","username":"old","apiKey":"k"}}}"#;

        let s = SyncSettings::from_document(doc).unwrap();

        assert_eq!(s.upstash.username, "snapsync");
        assert_eq!(s.upstash.api_key, "k");
    }

    #[test]
    fn v2_clears_legacy_proxy_url() {
        let doc = r#"{"version":2,"state":{"proxyUrl":"/api/cors/","upstash":{"username":"kept"}}}"#;

        let s = SyncSettings::from_document(doc).unwrap();

        assert_eq!(s.proxy_url, "");
        assert_eq!(s.upstash.username, "kept");
    }

    #[test]
    fn v2_keeps_custom_proxy_url() {
        let doc = r#"{"version":2,"state":{"proxyUrl":"https://relay.example.com"}}"#;
        let s = SyncSettings::from_document(doc).unwrap();
        assert_eq!(s.proxy_url, "https://relay.example.com");
    }

    #[test]
    fn current_version_is_not_migrated() {
        let doc = r#"{"version":3,"state":{"proxyUrl":"/api/cors/"}}"#;
        let s = SyncSettings::from_document(doc).unwrap();
        assert_eq!(s.proxy_url, "/api/cors/");
    }

    #[test]
    fn future_version_rejected() {
        let err = SyncSettings::from_document(r#"{"version":9,"state":{}}"#).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::UnsupportedVersion { found: 9, .. }
        ));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            SyncSettings::from_document("not json"),
            Err(SettingsError::Parse(_))
        ));
    }

    // ===========================================
    // Persistence Tests
    // ===========================================

    #[tokio::test]
    async fn save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = configured();
        settings.excluded_domains = vec![DomainKey::Access];
        settings.last_sync_time = 42;

        settings.save(&path).await.unwrap();
        let loaded = SyncSettings::load(&path).await.unwrap();

        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let loaded = SyncSettings::load(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(loaded, SyncSettings::default());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        configured().save(&path).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn debug_redacts_credentials() {
        let rendered = format!("{:?}", configured());
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn metadata_roundtrip() {
        let mut settings = configured();
        let mut meta = settings.metadata();
        meta.mark("webdav", 1234);

        settings.record_metadata(&meta);

        assert_eq!(settings.last_sync_time, 1234);
        assert_eq!(settings.last_provider, "webdav");
    }
}
