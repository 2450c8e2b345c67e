//! WebDAV store against a stub HTTP server.
//!
//! The stub speaks just enough WebDAV for the store: PROPFIND, GET, and PUT
//! with `Content-Range` reassembly. It records every request so tests can
//! assert on the wire shape.
//!
//! Run with: cargo test --test webdav_http

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use snapsync_client::{
    DomainRegistry, RemoteStore, StoreError, SyncEngine, SyncOptions, SyncOutcome, WebDavConfig,
    WebDavStore,
};
use snapsync_core::ChunkPolicy;
use snapsync_types::{DomainState, LwwRecord, Snapshot};

const USER: &str = "alice";
const PASSWORD: &str = "secret";

// ============================================================================
// STUB SERVER
// ============================================================================

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    query: Option<String>,
    content_range: Option<String>,
    depth: Option<String>,
}

#[derive(Default)]
struct StubInner {
    files: HashMap<String, Vec<u8>>,
    staging: HashMap<String, Vec<u8>>,
    requests: Vec<Recorded>,
    propfind_status: Option<u16>,
    put_failures: Vec<u16>,
}

#[derive(Clone, Default)]
struct Stub {
    inner: Arc<Mutex<StubInner>>,
}

impl Stub {
    fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    fn puts(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "PUT")
            .collect()
    }

    fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().files.get(path).cloned()
    }

    fn set_propfind_status(&self, status: u16) {
        self.inner.lock().unwrap().propfind_status = Some(status);
    }

    /// Answer the next PUTs with these statuses, in order.
    fn fail_puts(&self, statuses: &[u16]) {
        self.inner.lock().unwrap().put_failures = statuses.to_vec();
    }
}

fn parse_content_range(value: &str) -> Option<(usize, usize, usize)> {
    let rest = value.strip_prefix("bytes ")?;
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?, total.parse().ok()?))
}

async fn handle(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let mut inner = stub.inner.lock().unwrap();
    inner.requests.push(Recorded {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(String::from),
        content_range: header("content-range"),
        depth: header("depth"),
    });

    let expected_auth = format!("Basic {}", STANDARD.encode(format!("{USER}:{PASSWORD}")));
    if header("authorization").as_deref() != Some(expected_auth.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let path = uri.path().to_string();
    match method.as_str() {
        "PROPFIND" => {
            let status = inner.propfind_status.unwrap_or(207);
            StatusCode::from_u16(status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
        "GET" => match inner.files.get(&path) {
            Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        "PUT" => {
            if !inner.put_failures.is_empty() {
                let status = inner.put_failures.remove(0);
                return StatusCode::from_u16(status).unwrap().into_response();
            }
            let Some(range) = header("content-range") else {
                inner.files.insert(path, body.to_vec());
                return StatusCode::CREATED.into_response();
            };
            let Some((start, end, total)) = parse_content_range(&range) else {
                return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            };
            if end >= total || end + 1 - start != body.len() {
                return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            }
            let staged = inner
                .staging
                .entry(path.clone())
                .or_insert_with(|| vec![0; total]);
            if start == 0 {
                *staged = vec![0; total];
            }
            staged[start..=end].copy_from_slice(&body);
            if end + 1 == total {
                let complete = inner.staging.remove(&path).unwrap_or_default();
                inner.files.insert(path, complete);
            }
            StatusCode::NO_CONTENT.into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn spawn_stub() -> (Stub, SocketAddr) {
    let stub = Stub::default();
    let app = Router::new().fallback(handle).with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (stub, addr)
}

fn config(endpoint: String) -> WebDavConfig {
    WebDavConfig {
        endpoint,
        username: USER.into(),
        password: PASSWORD.into(),
        folder: "snapsync".into(),
        relay: None,
        timeout: Duration::from_secs(5),
        policy: ChunkPolicy::immediate(),
    }
}

fn store_for(addr: SocketAddr) -> WebDavStore {
    WebDavStore::new(config(format!("http://{addr}"))).unwrap()
}

// ============================================================================
// REACHABILITY
// ============================================================================

#[tokio::test]
async fn check_uses_propfind_with_depth() {
    let (stub, addr) = spawn_stub().await;

    assert!(store_for(addr).check().await);

    let requests = stub.requests();
    assert_eq!(requests[0].method, "PROPFIND");
    assert_eq!(requests[0].path, "/snapsync");
    assert_eq!(requests[0].depth.as_deref(), Some("1"));
}

#[tokio::test]
async fn check_treats_auth_failure_as_reachable() {
    let (_stub, addr) = spawn_stub().await;
    let mut cfg = config(format!("http://{addr}"));
    cfg.password = "wrong".into();

    assert!(WebDavStore::new(cfg).unwrap().check().await);
}

#[tokio::test]
async fn check_fails_on_server_error() {
    let (stub, addr) = spawn_stub().await;
    stub.set_propfind_status(500);

    assert!(!store_for(addr).check().await);
}

#[tokio::test]
async fn check_fails_when_nothing_listens() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(!store_for(addr).check().await);
}

// ============================================================================
// GET / PUT
// ============================================================================

#[tokio::test]
async fn missing_blob_reads_as_empty() {
    let (_stub, addr) = spawn_stub().await;

    let blob = store_for(addr).get("backup.json").await.unwrap();

    assert!(blob.is_empty());
}

#[tokio::test]
async fn small_payload_is_one_plain_put() {
    let (stub, addr) = spawn_stub().await;
    let store = store_for(addr);

    store.set("backup.json", b"hello").await.unwrap();

    let puts = stub.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].path, "/snapsync/backup.json");
    assert!(puts[0].content_range.is_none());
    assert_eq!(store.get("backup.json").await.unwrap(), b"hello");
}

#[tokio::test]
async fn large_payload_is_sent_as_ascending_ranges() {
    let (stub, addr) = spawn_stub().await;
    let mut cfg = config(format!("http://{addr}"));
    cfg.policy.chunk_size = 4;
    let store = WebDavStore::new(cfg).unwrap();

    let report = store.set("backup.json", b"0123456789").await.unwrap();

    assert_eq!(report.chunks, 3);
    let ranges: Vec<_> = stub
        .puts()
        .into_iter()
        .map(|r| r.content_range.unwrap())
        .collect();
    assert_eq!(
        ranges,
        vec!["bytes 0-3/10", "bytes 4-7/10", "bytes 8-9/10"]
    );
    assert_eq!(
        stub.file("/snapsync/backup.json"),
        Some(b"0123456789".to_vec())
    );
}

#[tokio::test]
async fn transient_put_failure_is_retried() {
    let (stub, addr) = spawn_stub().await;
    stub.fail_puts(&[503]);

    let report = store_for(addr).set("backup.json", b"data").await.unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(stub.puts().len(), 2);
}

#[tokio::test]
async fn range_not_satisfiable_is_not_retried() {
    let (stub, addr) = spawn_stub().await;
    stub.fail_puts(&[416]);

    let err = store_for(addr)
        .set("backup.json", b"data")
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::RangeNotSatisfiable));
    assert_eq!(stub.puts().len(), 1);
}

#[tokio::test]
async fn wrong_credentials_are_unauthorized() {
    let (stub, addr) = spawn_stub().await;
    let mut cfg = config(format!("http://{addr}"));
    cfg.password = "wrong".into();
    let store = WebDavStore::new(cfg).unwrap();

    let get_err = store.get("backup.json").await.unwrap_err();
    let set_err = store.set("backup.json", b"x").await.unwrap_err();

    assert!(matches!(get_err, StoreError::Unauthorized { status: 401 }));
    assert!(matches!(set_err, StoreError::Unauthorized { status: 401 }));
    assert_eq!(stub.puts().len(), 1);
}

// ============================================================================
// RELAY
// ============================================================================

#[tokio::test]
async fn relay_receives_prefixed_path_and_endpoint() {
    let (stub, addr) = spawn_stub().await;
    let mut cfg = config("https://dav.example.com/dav".into());
    cfg.relay = Some(format!("http://{addr}/"));
    let store = WebDavStore::new(cfg).unwrap();

    assert!(store.check().await);
    store.set("backup.json", b"via relay").await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests[0].path, "/api/webdav/snapsync");
    assert_eq!(
        requests[0].query.as_deref(),
        Some("endpoint=https%3A%2F%2Fdav.example.com%2Fdav&proxy_method=PROPFIND")
    );
    assert_eq!(requests[1].path, "/api/webdav/snapsync/backup.json");
    assert_eq!(
        requests[1].query.as_deref(),
        Some("endpoint=https%3A%2F%2Fdav.example.com%2Fdav")
    );
}

// ============================================================================
// FULL CYCLE
// ============================================================================

#[tokio::test]
async fn engine_bootstraps_then_merges_over_http() {
    let (_stub, addr) = spawn_stub().await;
    let local = Snapshot::from_states([DomainState::Config(
        LwwRecord::new().with("theme", "dark").with("lastUpdateTime", 1),
    )]);

    let first = SyncEngine::new(
        store_for(addr),
        DomainRegistry::in_memory(local),
        SyncOptions::default(),
    );
    assert!(matches!(first.sync().await, SyncOutcome::Bootstrapped));

    let other = Snapshot::from_states([DomainState::Config(
        LwwRecord::new().with("font", 12).with("lastUpdateTime", 0),
    )]);
    let second = SyncEngine::new(
        store_for(addr),
        DomainRegistry::in_memory(other),
        SyncOptions::default(),
    );
    assert!(matches!(second.sync().await, SyncOutcome::Merged));

    let merged = second.registry().snapshot().unwrap().config.unwrap();
    assert_eq!(merged.get("theme"), Some(&serde_json::json!("dark")));
    assert_eq!(merged.get("font"), Some(&serde_json::json!(12)));
}
