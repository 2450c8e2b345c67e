//! Byte-range chunk planning for resumable uploads.
//!
//! A payload larger than the chunk size is split into fixed windows sent in
//! ascending order. The receiving store reassembles by range, so ranges
//! never overlap and always cover `0..total` exactly.

use std::fmt;
use std::ops::Range;
use std::time::Duration;

use crate::backoff::retry_delay;

/// Default chunk window (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default retry budget per chunk (extra attempts after the first).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default hard cap on a single upload (500 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 500 * 1024 * 1024;

/// Errors raised while planning an upload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// Chunk size must be positive.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// Payload exceeds the configured maximum.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
}

/// An inclusive byte range within a payload of `total` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: usize,
    /// Last byte offset (inclusive).
    pub end: usize,
    /// Length of the whole payload.
    pub total: usize,
}

impl ByteRange {
    /// Number of bytes in this range.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Ranges are never empty; provided for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Half-open slice range for indexing the payload.
    pub fn as_slice_range(&self) -> Range<usize> {
        self.start..self.end + 1
    }

    /// Value for a `Content-Range` header.
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Split `total` bytes into ascending windows of at most `chunk_size`.
///
/// An empty payload yields no ranges.
pub fn plan_chunks(total: usize, chunk_size: usize) -> Result<Vec<ByteRange>, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }

    Ok((0..total)
        .step_by(chunk_size)
        .map(|start| ByteRange {
            start,
            end: (start + chunk_size).min(total) - 1,
            total,
        })
        .collect())
}

/// Upload tuning shared by every remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPolicy {
    /// Window size in bytes.
    pub chunk_size: usize,
    /// Extra attempts per chunk after the first one fails.
    pub max_retries: u32,
    /// First retry delay; doubles on each further attempt.
    pub base_delay: Duration,
    /// Ceiling for the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to every delay.
    pub max_jitter: Duration,
    /// Hard cap on the whole payload.
    pub max_payload: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ChunkPolicy {
    /// A policy with no delays, for tests and in-process stores.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Reject payloads over the limit before anything is sent.
    pub fn validate_payload(&self, size: usize) -> Result<(), ChunkError> {
        if size > self.max_payload {
            return Err(ChunkError::TooLarge {
                size,
                limit: self.max_payload,
            });
        }
        Ok(())
    }

    /// Whether a payload needs more than one request.
    pub fn needs_chunking(&self, size: usize) -> bool {
        size > self.chunk_size
    }

    /// Validate and plan a payload.
    pub fn plan(&self, size: usize) -> Result<Vec<ByteRange>, ChunkError> {
        self.validate_payload(size)?;
        plan_chunks(size, self.chunk_size)
    }

    /// Total attempts a chunk gets before the upload fails.
    pub fn attempts_per_chunk(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn retry_delay(&self, retry: u32) -> Duration {
        retry_delay(retry, self.base_delay, self.max_delay, self.max_jitter)
    }
}
