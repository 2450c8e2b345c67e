//! Remote store abstraction for snapsync.
//!
//! This module provides a pluggable keyed blob store that the sync
//! orchestrator pulls from and pushes to (WebDAV, Upstash, in-memory for
//! testing).
//!
//! # Design
//!
//! The store trait is async and request-oriented:
//! - `check()` probes reachability without transferring the blob
//! - `get()` downloads a blob; an absent blob is an empty result, not an error
//! - `set()` uploads a blob, chunking it when it exceeds the chunk size
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryStore::new();
//! store.set("backup.json", &encoded).await?;
//! let blob = store.get("backup.json").await?;
//! ```

mod memory;
mod upstash;
mod webdav;

pub use memory::MemoryStore;
pub use upstash::{UpstashConfig, UpstashStore};
pub use webdav::{WebDavConfig, WebDavStore};

use async_trait::async_trait;
use snapsync_core::ChunkError;
use thiserror::Error;

/// Remote store errors.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Could not reach the store.
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded its time budget.
    #[error("request timed out")]
    Timeout,

    /// Credentials were rejected.
    #[error("unauthorized (HTTP {status})")]
    Unauthorized {
        /// HTTP status (401 or 403).
        status: u16,
    },

    /// The store refused a byte range. Indicates a protocol mismatch.
    #[error("range not satisfiable")]
    RangeNotSatisfiable,

    /// Payload exceeds the configured maximum; nothing was sent.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Unexpected HTTP status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The store answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Store settings are unusable (bad URL, zero chunk size, ...).
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// A chunk kept failing until its retry budget ran out.
    #[error("chunk {index} failed after {attempts} attempts: {source}")]
    ChunkFailed {
        /// Zero-based chunk index.
        index: usize,
        /// Attempts made, including the first.
        attempts: u32,
        /// Last error seen.
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Whether the chunk retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Network(_) | StoreError::Timeout | StoreError::Status(_)
        )
    }

    /// Map an HTTP status onto the error taxonomy. `None` means success.
    pub fn from_status(status: u16) -> Option<StoreError> {
        match status {
            200..=299 => None,
            401 | 403 => Some(StoreError::Unauthorized { status }),
            416 => Some(StoreError::RangeNotSatisfiable),
            other => Some(StoreError::Status(other)),
        }
    }
}

impl From<ChunkError> for StoreError {
    fn from(err: ChunkError) -> Self {
        match err {
            ChunkError::TooLarge { size, limit } => StoreError::PayloadTooLarge { size, limit },
            ChunkError::ZeroChunkSize => StoreError::InvalidConfig(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_builder() {
            StoreError::InvalidConfig(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

/// Reachability probe statuses: reachable even when credentials are wrong.
pub const REACHABLE_STATUSES: [u16; 4] = [200, 207, 401, 403];

/// What an upload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadReport {
    /// Requests that carried payload bytes.
    pub chunks: usize,
    /// Requests made, retries included.
    pub attempts: u32,
    /// Payload size in bytes.
    pub bytes: usize,
}

/// A keyed blob store.
///
/// Implementations handle the wire protocol (WebDAV, Upstash REST, mock).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short provider name recorded as `lastProvider`.
    fn provider(&self) -> &str;

    /// Probe reachability. `false` only when the store cannot be reached.
    async fn check(&self) -> bool;

    /// Download a blob. Returns an empty vec when the blob does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Upload a blob, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<UploadReport, StoreError>;
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for Box<S> {
    fn provider(&self) -> &str {
        (**self).provider()
    }

    async fn check(&self) -> bool {
        (**self).check().await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<UploadReport, StoreError> {
        (**self).set(key, value).await
    }
}
