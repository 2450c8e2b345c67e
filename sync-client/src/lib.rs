//! # sync-client
//!
//! Client library for snapsync, the offline-first state synchronization
//! engine.
//!
//! This is the main library that host applications use to sync state.
//!
//! ## Features
//!
//! - **Remote Stores**: WebDAV and Upstash behind one [`RemoteStore`] trait,
//!   plus an in-memory store for tests
//! - **Chunked Upload**: ascending byte ranges, per-chunk retry with backoff
//! - **Transport Codec**: zstd compression armored as base64 text
//! - **Pure State Machine**: uses sync-core for merge logic and cycle phases
//! - **Auto-Sync**: a scheduler owned by the host, with an exclusivity latch
//!
//! ## Example
//!
//! ```ignore
//! use snapsync_client::{DomainRegistry, SyncEngine, SyncSettings};
//!
//! let settings = SyncSettings::load(&path).await?;
//! let engine = SyncEngine::new(settings.open_store()?, registry, settings.sync_options());
//!
//! let outcome = engine.sync().await;
//! println!("{}", outcome.notice());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup;
pub mod codec;
pub mod engine;
pub mod registry;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod upload;

pub use backup::{backup_file_name, export_backup, import_backup, BackupError, ImportReport};
pub use codec::{Codec, CodecError};
pub use engine::{EngineError, SyncEngine, SyncOptions, SyncOutcome};
pub use registry::{DomainRegistry, DomainStore, RegistryError, SharedDomain};
pub use scheduler::{AutoSync, SchedulerCommand, SchedulerError, OUTCOME_BUFFER};
pub use settings::{
    Provider, SettingsError, SyncSettings, UpstashCredentials, WebDavCredentials,
    SETTINGS_VERSION,
};
pub use store::{
    MemoryStore, RemoteStore, StoreError, UploadReport, UpstashConfig, UpstashStore,
    WebDavConfig, WebDavStore,
};
