//! Error types for snapsync data model operations.

use thiserror::Error;

/// Errors that can occur while (de)serializing snapshots and domain state.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Domain name is not one of the known domains
    #[error("unknown domain: {0}")]
    UnknownDomain(String),
}
