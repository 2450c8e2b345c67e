//! Upstash Redis REST store.
//!
//! Values are always split by key: chunk `i` lives under `{key}-chunk-{i}`
//! and the chunk count under `{key}-chunk-count`, so no single value
//! exceeds the per-value limit of the service. The blob key is namespaced
//! by user: `{username}/{key}`.
//!
//! With a relay configured, commands go to `{relay}/api/upstash/{command}/{key}`
//! and the real endpoint travels in the `endpoint` query parameter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use snapsync_core::{ByteRange, ChunkPolicy};
use tracing::{debug, info, warn};

use super::{RemoteStore, StoreError, UploadReport, REACHABLE_STATUSES};
use crate::upload::{upload_ranges, with_retry, ChunkSink};

/// Path segments a relay serves Upstash commands under.
const RELAY_PREFIX: [&str; 2] = ["api", "upstash"];

/// Connection settings for an Upstash store.
#[derive(Clone)]
pub struct UpstashConfig {
    /// REST endpoint (`https://<db>.upstash.io`).
    pub endpoint: String,
    /// Key namespace.
    pub username: String,
    /// REST token.
    pub api_key: String,
    /// Blob key probed by `check()`.
    pub probe_key: String,
    /// Forwarding relay base URL. `None` or empty means direct.
    pub relay: Option<String>,
    /// Per-request time budget.
    pub timeout: Duration,
    /// Upload chunking and retry policy.
    pub policy: ChunkPolicy,
}

impl std::fmt::Debug for UpstashConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstashConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .field("probe_key", &self.probe_key)
            .field("relay", &self.relay)
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RestReply {
    result: Option<String>,
}

/// Upstash store over its REST API.
#[derive(Debug, Clone)]
pub struct UpstashStore {
    client: Client,
    config: UpstashConfig,
}

impl UpstashStore {
    /// Create a store. Fails only if the HTTP client cannot be built.
    pub fn new(config: UpstashConfig) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// The namespaced blob key.
    pub fn store_key(&self, key: &str) -> String {
        if self.config.username.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.config.username, key)
        }
    }

    /// URL for a REST command, routed through the relay when one is
    /// configured. The key is one percent-encoded path segment.
    pub fn command_url(&self, command: &str, key: &str) -> Result<Url, StoreError> {
        let relay = self.config.relay.as_deref().filter(|r| !r.is_empty());
        let base = relay.unwrap_or(&self.config.endpoint);
        let mut url =
            Url::parse(base).map_err(|e| StoreError::InvalidConfig(format!("{base}: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| StoreError::InvalidConfig(format!("{base} cannot be a base URL")))?;
            segments.pop_if_empty();
            if relay.is_some() {
                segments.extend(RELAY_PREFIX);
            }
            segments.push(command).push(key);
        }
        if relay.is_some() {
            url.query_pairs_mut()
                .append_pair("endpoint", &self.config.endpoint);
        }
        Ok(url)
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let response = self
            .client
            .get(self.command_url("get", key)?)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        if let Some(err) = StoreError::from_status(response.status().as_u16()) {
            return Err(err);
        }
        let reply: RestReply = response
            .json()
            .await
            .map_err(|e| StoreError::Protocol(e.to_string()))?;
        Ok(reply.result)
    }

    /// Chunk count of a stored blob, `None` if nothing is stored.
    async fn chunk_count(&self, store_key: &str) -> Result<Option<usize>, StoreError> {
        let Some(count) = self.read(&count_key(store_key)).await? else {
            return Ok(None);
        };
        count
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StoreError::Protocol(format!("invalid chunk count {count:?}")))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.command_url("del", key)?)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        match StoreError::from_status(response.status().as_u16()) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Delete chunks a shorter upload left behind. Failures only leave
    /// unreachable values, so they are logged and skipped.
    async fn prune(&self, store_key: &str, count: usize, previous: usize) {
        for index in count..previous {
            if let Err(e) = self.remove(&chunk_key(store_key, index)).await {
                warn!(index, error = %e, "failed to delete stale upstash chunk");
            }
        }
        if previous > count {
            debug!(removed = previous - count, "pruned stale upstash chunks");
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.command_url("set", key)?)
            .bearer_auth(&self.config.api_key)
            .body(value.to_vec())
            .send()
            .await?;
        let status = response.status().as_u16();
        debug!(key, status, bytes = value.len(), "upstash set");
        match StoreError::from_status(status) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

fn chunk_key(store_key: &str, index: usize) -> String {
    format!("{store_key}-chunk-{index}")
}

fn count_key(store_key: &str) -> String {
    format!("{store_key}-chunk-count")
}

struct UpstashSink<'a> {
    store: &'a UpstashStore,
    store_key: String,
}

#[async_trait]
impl ChunkSink for UpstashSink<'_> {
    async fn put_chunk(
        &self,
        index: usize,
        _range: Option<ByteRange>,
        body: &[u8],
    ) -> Result<(), StoreError> {
        self.store
            .write(&chunk_key(&self.store_key, index), body)
            .await
    }
}

#[async_trait]
impl RemoteStore for UpstashStore {
    fn provider(&self) -> &str {
        "upstash"
    }

    async fn check(&self) -> bool {
        let probe = count_key(&self.store_key(&self.config.probe_key));
        let url = match self.command_url("get", &probe) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "upstash check failed");
                return false;
            }
        };
        match self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                let reachable = REACHABLE_STATUSES.contains(&status);
                info!(status, reachable, "upstash check");
                reachable
            }
            Err(e) => {
                warn!(error = %e, "upstash check failed");
                false
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let store_key = self.store_key(key);
        let Some(count) = self.chunk_count(&store_key).await? else {
            return Ok(Vec::new());
        };

        let mut blob = Vec::new();
        for index in 0..count {
            let chunk = self
                .read(&chunk_key(&store_key, index))
                .await?
                .ok_or_else(|| StoreError::Protocol(format!("missing chunk {index}")))?;
            blob.extend_from_slice(chunk.as_bytes());
        }
        debug!(key, chunks = count, bytes = blob.len(), "upstash get");
        Ok(blob)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<UploadReport, StoreError> {
        let policy = &self.config.policy;
        let ranges = policy.plan(value.len())?;
        let sink = UpstashSink {
            store: self,
            store_key: self.store_key(key),
        };
        let previous = match self.chunk_count(&sink.store_key).await {
            Ok(previous) => previous.unwrap_or(0),
            Err(e) => {
                debug!(error = %e, "previous chunk count unknown, skipping prune");
                0
            }
        };

        let mut report = upload_ranges(&sink, value, &ranges, policy).await?;

        let count = ranges.len().to_string();
        let count_slot = count_key(&sink.store_key);
        report.attempts += with_retry(policy, ranges.len(), || {
            self.write(&count_slot, count.as_bytes())
        })
        .await?;
        self.prune(&sink.store_key, ranges.len(), previous).await;

        info!(
            key,
            bytes = report.bytes,
            chunks = report.chunks,
            attempts = report.attempts,
            "upstash upload complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(username: &str) -> UpstashConfig {
        UpstashConfig {
            endpoint: "https://eu1-demo.upstash.io".into(),
            username: username.into(),
            api_key: "s3cr3t-token".into(),
            probe_key: "backup.json".into(),
            relay: None,
            timeout: Duration::from_secs(5),
            policy: ChunkPolicy::immediate(),
        }
    }

    fn store(username: &str) -> UpstashStore {
        UpstashStore::new(config(username)).unwrap()
    }

    #[test]
    fn key_is_namespaced_by_user() {
        assert_eq!(store("alice").store_key("backup.json"), "alice/backup.json");
        assert_eq!(store("").store_key("backup.json"), "backup.json");
    }

    #[test]
    fn namespaced_key_is_a_single_path_segment() {
        let store = store("alice");
        let url = store
            .command_url("get", &count_key(&store.store_key("backup.json")))
            .unwrap();
        assert_eq!(url.path(), "/get/alice%2Fbackup.json-chunk-count");
    }

    #[test]
    fn relay_url_carries_command_key_and_endpoint() {
        let mut cfg = config("alice");
        cfg.relay = Some("https://relay.example.com/".into());
        let store = UpstashStore::new(cfg).unwrap();

        let url = store
            .command_url("set", &store.store_key("backup.json-chunk-0"))
            .unwrap();

        assert_eq!(url.host_str(), Some("relay.example.com"));
        assert_eq!(url.path(), "/api/upstash/set/alice%2Fbackup.json-chunk-0");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![(
                "endpoint".to_string(),
                "https://eu1-demo.upstash.io".to_string()
            )]
        );
    }

    #[test]
    fn empty_relay_means_direct() {
        let mut cfg = config("alice");
        cfg.relay = Some(String::new());
        let store = UpstashStore::new(cfg).unwrap();

        let url = store.command_url("get", "k").unwrap();

        assert_eq!(url.as_str(), "https://eu1-demo.upstash.io/get/k");
    }

    #[test]
    fn chunk_keys_are_indexed() {
        assert_eq!(chunk_key("u/k", 0), "u/k-chunk-0");
        assert_eq!(chunk_key("u/k", 12), "u/k-chunk-12");
    }

    #[test]
    fn rest_reply_null_result() {
        let reply: RestReply = serde_json::from_str(r#"{"result":null}"#).unwrap();
        assert!(reply.result.is_none());
        let reply: RestReply = serde_json::from_str(r#"{"result":"3"}"#).unwrap();
        assert_eq!(reply.result.as_deref(), Some("3"));
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", store("alice"));
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
