//! In-memory store for testing.
//!
//! Reassembles ranged uploads the way a WebDAV server would, and allows
//! injecting failures and inspecting every request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use snapsync_core::{ByteRange, ChunkPolicy};

use super::{RemoteStore, StoreError, UploadReport};
use crate::upload::{upload, ChunkSink};

/// In-memory remote store.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug)]
struct MemoryStoreInner {
    blobs: HashMap<String, Vec<u8>>,
    staging: HashMap<String, Vec<u8>>,
    policy: ChunkPolicy,
    reachable: bool,
    get_delay: Option<Duration>,
    get_calls: usize,
    set_calls: usize,
    check_calls: usize,
    chunk_log: Vec<(usize, Option<ByteRange>)>,
    fail_next_get: Option<StoreError>,
    chunk_failures: HashMap<usize, (u32, StoreError)>,
}

impl Default for MemoryStoreInner {
    fn default() -> Self {
        Self {
            blobs: HashMap::new(),
            staging: HashMap::new(),
            policy: ChunkPolicy::immediate(),
            reachable: true,
            get_delay: None,
            get_calls: 0,
            set_calls: 0,
            check_calls: 0,
            chunk_log: Vec::new(),
            fail_next_get: None,
            chunk_failures: HashMap::new(),
        }
    }
}

impl MemoryStore {
    /// Create an empty store with an immediate-retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific chunk policy (builder style).
    pub fn with_policy(self, policy: ChunkPolicy) -> Self {
        self.lock().policy = policy;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a blob directly, bypassing the upload path.
    pub fn put_raw(&self, key: &str, value: &[u8]) {
        self.lock().blobs.insert(key.to_string(), value.to_vec());
    }

    /// Read a blob directly.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(key).cloned()
    }

    /// Number of `get()` calls so far.
    pub fn get_calls(&self) -> usize {
        self.lock().get_calls
    }

    /// Number of `set()` calls so far.
    pub fn set_calls(&self) -> usize {
        self.lock().set_calls
    }

    /// Number of `check()` calls so far.
    pub fn check_calls(&self) -> usize {
        self.lock().check_calls
    }

    /// Every upload request, retries included, as `(chunk index, range)`.
    pub fn chunk_log(&self) -> Vec<(usize, Option<ByteRange>)> {
        self.lock().chunk_log.clone()
    }

    /// Make `check()` report the store as unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Hold every `get()` for `delay` before answering.
    pub fn delay_gets(&self, delay: Duration) {
        self.lock().get_delay = Some(delay);
    }

    /// Cause the next `get()` to fail with the given error.
    pub fn fail_next_get(&self, error: StoreError) {
        self.lock().fail_next_get = Some(error);
    }

    /// Cause chunk `index` to fail `times` times with the given error.
    pub fn fail_chunk(&self, index: usize, times: u32, error: StoreError) {
        self.lock().chunk_failures.insert(index, (times, error));
    }

    /// Clear all state (blobs, counters, injected failures).
    pub fn reset(&self) {
        *self.lock() = MemoryStoreInner::default();
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MemorySink<'a> {
    store: &'a MemoryStore,
    key: &'a str,
}

#[async_trait]
impl ChunkSink for MemorySink<'_> {
    async fn put_chunk(
        &self,
        index: usize,
        range: Option<ByteRange>,
        body: &[u8],
    ) -> Result<(), StoreError> {
        let mut inner = self.store.lock();
        inner.chunk_log.push((index, range));

        if let Some((remaining, error)) = inner.chunk_failures.get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }

        let Some(range) = range else {
            inner.blobs.insert(self.key.to_string(), body.to_vec());
            return Ok(());
        };

        if range.end >= range.total || body.len() != range.len() {
            return Err(StoreError::RangeNotSatisfiable);
        }

        let staged = inner
            .staging
            .entry(self.key.to_string())
            .or_insert_with(Vec::new);
        if range.start == 0 || staged.len() != range.total {
            *staged = vec![0; range.total];
        }
        staged[range.as_slice_range()].copy_from_slice(body);

        if range.end + 1 == range.total {
            if let Some(complete) = inner.staging.remove(self.key) {
                inner.blobs.insert(self.key.to_string(), complete);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn provider(&self) -> &str {
        "memory"
    }

    async fn check(&self) -> bool {
        let mut inner = self.lock();
        inner.check_calls += 1;
        inner.reachable
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let delay = {
            let mut inner = self.lock();
            inner.get_calls += 1;
            inner.get_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_get.take() {
            return Err(error);
        }
        Ok(inner.blobs.get(key).cloned().unwrap_or_default())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<UploadReport, StoreError> {
        let policy = {
            let mut inner = self.lock();
            inner.set_calls += 1;
            inner.policy.clone()
        };

        let sink = MemorySink { store: self, key };
        upload(&sink, value, &policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(chunk_size: usize, max_retries: u32) -> ChunkPolicy {
        ChunkPolicy {
            chunk_size,
            max_retries,
            ..ChunkPolicy::immediate()
        }
    }

    // ===========================================
    // MemoryStore Basic Tests
    // ===========================================

    #[tokio::test]
    async fn missing_key_is_empty() {
        let store = MemoryStore::new();
        assert!(store.get("nothing").await.unwrap().is_empty());
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStore::new();

        store.set("k", b"hello").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), b"hello");
        assert_eq!(store.set_calls(), 1);
    }

    #[tokio::test]
    async fn chunked_upload_reassembles() {
        let store = MemoryStore::new().with_policy(chunked(3, 0));
        let payload = b"abcdefghij";

        let report = store.set("k", payload).await.unwrap();

        assert_eq!(report.chunks, 4);
        assert_eq!(store.raw("k"), Some(payload.to_vec()));
        let ranges: Vec<_> = store
            .chunk_log()
            .into_iter()
            .map(|(_, r)| r.unwrap().header_value())
            .collect();
        assert_eq!(
            ranges,
            vec![
                "bytes 0-2/10",
                "bytes 3-5/10",
                "bytes 6-8/10",
                "bytes 9-9/10"
            ]
        );
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();

        store.put_raw("k", b"v");

        assert_eq!(handle.raw("k"), Some(b"v".to_vec()));
    }

    // ===========================================
    // Failure Injection Tests
    // ===========================================

    #[tokio::test]
    async fn injected_get_failure_fires_once() {
        let store = MemoryStore::new();
        store.fail_next_get(StoreError::Timeout);

        assert!(matches!(store.get("k").await, Err(StoreError::Timeout)));
        assert!(store.get("k").await.is_ok());
    }

    #[tokio::test]
    async fn exhausted_chunk_leaves_previous_blob() {
        let store = MemoryStore::new().with_policy(chunked(2, 1));
        store.put_raw("k", b"old");
        store.fail_chunk(1, u32::MAX, StoreError::Status(500));

        let err = store.set("k", b"abcdef").await.unwrap_err();

        assert!(matches!(err, StoreError::ChunkFailed { index: 1, .. }));
        assert_eq!(store.raw("k"), Some(b"old".to_vec()));
    }

    #[tokio::test]
    async fn unreachable_check() {
        let store = MemoryStore::new();
        assert!(store.check().await);

        store.set_reachable(false);

        assert!(!store.check().await);
        assert_eq!(store.check_calls(), 2);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let store = MemoryStore::new();
        store.put_raw("k", b"v");
        store.get("k").await.unwrap();

        store.reset();

        assert_eq!(store.raw("k"), None);
        assert_eq!(store.get_calls(), 0);
    }
}
