//! WebDAV remote store.
//!
//! The blob lives at `{endpoint}/{folder}/{key}`. When a relay is
//! configured every request goes to `{relay}/api/webdav/{folder}/{key}`
//! instead, with the real endpoint passed as the `endpoint` query parameter
//! and the original method as `proxy_method` for methods a relay may not
//! forward natively.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use snapsync_core::{ByteRange, ChunkPolicy};
use tracing::{debug, info, warn};

use super::{RemoteStore, StoreError, UploadReport, REACHABLE_STATUSES};
use crate::upload::{upload, ChunkSink};

const RELAY_PREFIX: &str = "api/webdav";

/// Connection settings for a WebDAV store.
#[derive(Clone)]
pub struct WebDavConfig {
    /// Server base URL.
    pub endpoint: String,
    /// Basic auth user.
    pub username: String,
    /// Basic auth password.
    pub password: String,
    /// Folder holding the blob.
    pub folder: String,
    /// Forwarding relay base URL, if requests must not go direct.
    pub relay: Option<String>,
    /// Per-request time budget.
    pub timeout: Duration,
    /// Upload chunking and retry policy.
    pub policy: ChunkPolicy,
}

impl std::fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("folder", &self.folder)
            .field("relay", &self.relay)
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .finish()
    }
}

/// WebDAV store over HTTP.
#[derive(Debug, Clone)]
pub struct WebDavStore {
    client: Client,
    config: WebDavConfig,
}

impl WebDavStore {
    /// Create a store. Fails only if the HTTP client cannot be built.
    pub fn new(config: WebDavConfig) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// URL for `path` (relative to the endpoint), routed through the relay
    /// when one is configured.
    pub fn url(&self, path: &str, proxy_method: Option<&str>) -> Result<Url, StoreError> {
        let path = path.trim_start_matches('/');

        let Some(relay) = self.config.relay.as_deref().filter(|r| !r.is_empty()) else {
            let base = self.config.endpoint.trim_end_matches('/');
            return parse_url(&format!("{base}/{path}"));
        };

        let mut url = parse_url(&format!(
            "{}/{RELAY_PREFIX}/{path}",
            relay.trim_end_matches('/')
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("endpoint", &self.config.endpoint);
            if let Some(method) = proxy_method {
                query.append_pair("proxy_method", method);
            }
        }
        Ok(url)
    }

    fn blob_path(&self, key: &str) -> String {
        format!("{}/{}", self.config.folder.trim_matches('/'), key)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password))
    }

    async fn propfind_status(&self) -> Result<u16, StoreError> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        let url = self.url(&self.config.folder, Some("PROPFIND"))?;
        let response = self.request(method, url).header("Depth", "1").send().await?;
        Ok(response.status().as_u16())
    }
}

fn parse_url(raw: &str) -> Result<Url, StoreError> {
    Url::parse(raw).map_err(|e| StoreError::InvalidConfig(format!("{raw}: {e}")))
}

struct WebDavSink<'a> {
    store: &'a WebDavStore,
    url: Url,
}

#[async_trait]
impl ChunkSink for WebDavSink<'_> {
    async fn put_chunk(
        &self,
        index: usize,
        range: Option<ByteRange>,
        body: &[u8],
    ) -> Result<(), StoreError> {
        let mut request = self
            .store
            .request(Method::PUT, self.url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(body.to_vec());
        if let Some(range) = range {
            request = request.header(CONTENT_RANGE, range.header_value());
        }

        let status = request.send().await?.status().as_u16();
        debug!(index, status, bytes = body.len(), "webdav put");
        match StoreError::from_status(status) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[async_trait]
impl RemoteStore for WebDavStore {
    fn provider(&self) -> &str {
        "webdav"
    }

    async fn check(&self) -> bool {
        match self.propfind_status().await {
            Ok(status) => {
                let reachable = REACHABLE_STATUSES.contains(&status);
                info!(status, reachable, "webdav check");
                reachable
            }
            Err(e) => {
                warn!(error = %e, "webdav check failed");
                false
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url(&self.blob_path(key), None)?;
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status().as_u16();
        debug!(key, status, "webdav get");

        if status == 404 {
            return Ok(Vec::new());
        }
        if let Some(err) = StoreError::from_status(status) {
            return Err(err);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<UploadReport, StoreError> {
        let sink = WebDavSink {
            store: self,
            url: self.url(&self.blob_path(key), None)?,
        };
        let report = upload(&sink, value, &self.config.policy).await?;
        info!(
            key,
            bytes = report.bytes,
            chunks = report.chunks,
            attempts = report.attempts,
            "webdav upload complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(relay: Option<&str>) -> WebDavConfig {
        WebDavConfig {
            endpoint: "https://dav.example.com/remote.php/dav/".into(),
            username: "alice".into(),
            password: "hunter2".into(),
            folder: "snapsync".into(),
            relay: relay.map(String::from),
            timeout: Duration::from_secs(5),
            policy: ChunkPolicy::immediate(),
        }
    }

    // ===========================================
    // URL Shape Tests
    // ===========================================

    #[test]
    fn direct_url_joins_endpoint_and_path() {
        let store = WebDavStore::new(config(None)).unwrap();

        let url = store.url("snapsync/backup.json", None).unwrap();

        assert_eq!(
            url.as_str(),
            "https://dav.example.com/remote.php/dav/snapsync/backup.json"
        );
    }

    #[test]
    fn relay_url_carries_endpoint_and_method() {
        let store = WebDavStore::new(config(Some("https://relay.example.com/"))).unwrap();

        let url = store.url("/snapsync", Some("PROPFIND")).unwrap();

        assert_eq!(url.path(), "/api/webdav/snapsync");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![
                (
                    "endpoint".to_string(),
                    "https://dav.example.com/remote.php/dav/".to_string()
                ),
                ("proxy_method".to_string(), "PROPFIND".to_string()),
            ]
        );
    }

    #[test]
    fn empty_relay_means_direct() {
        let store = WebDavStore::new(config(Some(""))).unwrap();
        let url = store.url("a", None).unwrap();
        assert!(url.as_str().starts_with("https://dav.example.com/"));
    }

    #[test]
    fn relative_endpoint_is_invalid_config() {
        let mut cfg = config(None);
        cfg.endpoint = "not a url".into();
        let store = WebDavStore::new(cfg).unwrap();

        assert!(matches!(
            store.url("x", None),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", config(None));
        assert!(!rendered.contains("hunter2"));
    }
}
