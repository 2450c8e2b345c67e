//! SyncEngine - the sync orchestrator.
//!
//! Drives one pull-merge-push cycle at a time against a [`RemoteStore`].
//!
//! # Architecture
//!
//! The engine feeds events into the pure cycle machine from sync-core and
//! performs the I/O each returned action names.
//!
//! ```text
//! Host → SyncEngine → RemoteStore → Network
//!            ↓
//!        sync-core (cycle machine, merge strategies)
//! ```
//!
//! A cycle never raises: every failure is caught where it happens and
//! reported as [`SyncOutcome::Failed`], leaving the next scheduled tick to
//! try again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use snapsync_core::{
    CycleAction, CycleEvent, CycleNotice, CyclePhase, DomainMerger, MergeContext, SnapshotMerge,
};
use snapsync_types::{now_millis, DomainKey, Snapshot, SyncError, SyncMetadata};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::codec::{Codec, CodecError};
use crate::registry::{DomainRegistry, RegistryError};
use crate::store::{RemoteStore, StoreError};

/// Engine errors. Always delivered inside a [`SyncOutcome`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Remote store failed.
    #[error("remote store error: {0}")]
    Store(#[from] StoreError),

    /// Codec failed on the local snapshot.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Snapshot (de)serialization failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SyncError),

    /// Reading or writing live state failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Orchestrator options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Blob name in the remote store.
    pub remote_key: String,
    /// Domains kept out of uploads (never out of local state).
    pub excluded_domains: Vec<DomainKey>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            remote_key: "backup.json".to_string(),
            excluded_domains: Vec::new(),
        }
    }
}

/// How a call to [`SyncEngine::sync`] ended.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Another cycle was already running; nothing was done.
    Skipped,
    /// Remote was empty; local state was uploaded as the first copy.
    Bootstrapped,
    /// Remote was merged into local state and the result uploaded.
    Merged,
    /// Remote was unreadable; local state was uploaded in its place.
    Repaired {
        /// Why the remote could not be decoded.
        reason: String,
    },
    /// The cycle failed. Local state may hold an applied merge.
    Failed(EngineError),
}

impl SyncOutcome {
    /// Whether the cycle recorded a successful sync.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Bootstrapped | SyncOutcome::Merged | SyncOutcome::Repaired { .. }
        )
    }

    /// One-line message for the user.
    pub fn notice(&self) -> String {
        match self {
            SyncOutcome::Skipped => "sync already in progress".to_string(),
            SyncOutcome::Bootstrapped => {
                "first sync: local data is now the remote copy".to_string()
            }
            SyncOutcome::Merged => "sync complete".to_string(),
            SyncOutcome::Repaired { .. } => {
                "remote data was unreadable and has been replaced with local data".to_string()
            }
            SyncOutcome::Failed(e) => format!("sync failed: {e}"),
        }
    }
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// The sync orchestrator.
///
/// At most one cycle runs at a time; a trigger arriving mid-cycle returns
/// [`SyncOutcome::Skipped`].
pub struct SyncEngine<S: RemoteStore> {
    store: S,
    registry: DomainRegistry,
    codec: Codec,
    merger: Box<dyn SnapshotMerge>,
    options: SyncOptions,
    clock: Clock,
    metadata: Mutex<SyncMetadata>,
    phase: Mutex<CyclePhase>,
    in_flight: AtomicBool,
}

impl<S: RemoteStore> std::fmt::Debug for SyncEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("provider", &self.store.provider())
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Releases the in-flight latch and resets the phase, also when the cycle
/// future is dropped mid-way.
struct CycleGuard<'a> {
    in_flight: &'a AtomicBool,
    phase: &'a Mutex<CyclePhase>,
}

impl<'a> CycleGuard<'a> {
    fn acquire(in_flight: &'a AtomicBool, phase: &'a Mutex<CyclePhase>) -> Option<Self> {
        in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { in_flight, phase })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = CyclePhase::Idle;
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Per-cycle scratch state.
struct Cycle {
    local: Snapshot,
    remote: Vec<u8>,
    notice: Option<CycleNotice>,
    failure: Option<EngineError>,
}

impl<S: RemoteStore> SyncEngine<S> {
    /// Create an engine with the standard merge strategies.
    pub fn new(store: S, registry: DomainRegistry, options: SyncOptions) -> Self {
        Self {
            store,
            registry,
            codec: Codec::default(),
            merger: Box::new(DomainMerger),
            options,
            clock: Arc::new(now_millis),
            metadata: Mutex::new(SyncMetadata::default()),
            phase: Mutex::new(CyclePhase::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Replace the merge strategy set (builder style).
    pub fn with_merger(mut self, merger: Box<dyn SnapshotMerge>) -> Self {
        self.merger = merger;
        self
    }

    /// Replace the codec (builder style).
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Replace the wall clock (builder style).
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        let clock: Clock = Arc::new(clock);
        self.clock = clock;
        self
    }

    /// Seed bookkeeping from persisted settings (builder style).
    pub fn with_metadata(self, metadata: SyncMetadata) -> Self {
        *self.lock_metadata() = metadata;
        self
    }

    fn lock_metadata(&self) -> MutexGuard<'_, SyncMetadata> {
        self.metadata.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The remote store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The domain registry.
    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Current bookkeeping.
    pub fn metadata(&self) -> SyncMetadata {
        self.lock_metadata().clone()
    }

    /// Current cycle phase.
    pub fn phase(&self) -> CyclePhase {
        self.phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a cycle is running.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Probe the remote store.
    pub async fn check(&self) -> bool {
        self.store.check().await
    }

    /// Run one sync cycle.
    ///
    /// Dropping the returned future cancels the cycle: in-flight requests
    /// are aborted and the latch is released. Domains already applied stay
    /// applied.
    pub async fn sync(&self) -> SyncOutcome {
        let Some(_guard) = CycleGuard::acquire(&self.in_flight, &self.phase) else {
            info!("sync already in progress, trigger dropped");
            return SyncOutcome::Skipped;
        };

        let local = match self.registry.snapshot() {
            Ok(local) => local,
            Err(e) => {
                error!(error = %e, "failed to read local state");
                return SyncOutcome::Failed(e.into());
            }
        };

        let mut cycle = Cycle {
            local,
            remote: Vec::new(),
            notice: None,
            failure: None,
        };
        let mut actions: VecDeque<CycleAction> = self.transition(CycleEvent::Start).into();

        while let Some(action) = actions.pop_front() {
            let event = match action {
                CycleAction::FetchRemote => self.fetch(&mut cycle).await,
                CycleAction::DecodeRemote => self.merge(&mut cycle),
                CycleAction::UploadLocal => self.upload(&mut cycle).await,
                CycleAction::MarkSynced => {
                    let now = (self.clock)();
                    self.lock_metadata().mark(self.store.provider(), now);
                    continue;
                }
                CycleAction::Notify(notice) => {
                    cycle.notice = Some(notice);
                    continue;
                }
            };
            actions.extend(self.transition(event));
        }

        self.finish(cycle)
    }

    fn transition(&self, event: CycleEvent) -> Vec<CycleAction> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        let (next, actions) = phase.clone().on_event(event);
        debug!(from = phase.label(), to = next.label(), "cycle transition");
        *phase = next;
        actions
    }

    async fn fetch(&self, cycle: &mut Cycle) -> CycleEvent {
        match self.store.get(&self.options.remote_key).await {
            Ok(bytes) if bytes.trim_ascii().is_empty() => {
                info!(provider = self.store.provider(), "remote is empty, bootstrapping");
                CycleEvent::RemoteEmpty
            }
            Ok(bytes) => {
                debug!(bytes = bytes.len(), "fetched remote snapshot");
                cycle.remote = bytes;
                CycleEvent::RemoteFound
            }
            Err(e) => Self::fail(cycle, e.into()),
        }
    }

    fn merge(&self, cycle: &mut Cycle) -> CycleEvent {
        let remote = match self.decode(&cycle.remote) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "remote snapshot unreadable, re-uploading local state");
                return CycleEvent::DecodeFailed {
                    error: e.to_string(),
                };
            }
        };

        let ctx = MergeContext::at((self.clock)());
        let merged = self.merger.merge(&cycle.local, &remote, &ctx);
        debug!(domains = ?merged.keys(), "merged remote snapshot");

        // Keep the merge as the upload source even if applying it fails.
        cycle.local = merged.clone();
        match self.registry.apply(merged) {
            Ok(()) => CycleEvent::Merged,
            Err(e) => Self::fail(cycle, e.into()),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Snapshot, EngineError> {
        let json = self.codec.decode(payload)?;
        Ok(Snapshot::from_json_bytes(&json)?)
    }

    async fn upload(&self, cycle: &mut Cycle) -> CycleEvent {
        let payload = match self.encode(&cycle.local) {
            Ok(payload) => payload,
            Err(e) => return Self::fail(cycle, e),
        };

        match self.store.set(&self.options.remote_key, &payload).await {
            Ok(report) => {
                info!(
                    bytes = report.bytes,
                    chunks = report.chunks,
                    attempts = report.attempts,
                    "uploaded snapshot"
                );
                CycleEvent::Uploaded
            }
            Err(e) => Self::fail(cycle, e.into()),
        }
    }

    fn encode(&self, local: &Snapshot) -> Result<Vec<u8>, EngineError> {
        let filtered = local.without(&self.options.excluded_domains);
        Ok(self.codec.encode(&filtered.to_json_bytes()?)?)
    }

    fn fail(cycle: &mut Cycle, error: EngineError) -> CycleEvent {
        let message = error.to_string();
        cycle.failure = Some(error);
        CycleEvent::Failed { error: message }
    }

    fn finish(&self, cycle: Cycle) -> SyncOutcome {
        let outcome = match (cycle.notice, cycle.failure) {
            (Some(CycleNotice::Bootstrapped), _) => SyncOutcome::Bootstrapped,
            (Some(CycleNotice::Synced), _) => SyncOutcome::Merged,
            (Some(CycleNotice::Repaired { error }), _) => SyncOutcome::Repaired { reason: error },
            (_, Some(failure)) => SyncOutcome::Failed(failure),
            (notice, None) => SyncOutcome::Failed(EngineError::Store(StoreError::Protocol(
                format!("cycle ended without a result: {notice:?}"),
            ))),
        };

        match &outcome {
            SyncOutcome::Failed(e) => error!(error = %e, "sync failed"),
            other => info!(provider = self.store.provider(), "{}", other.notice()),
        }
        outcome
    }
}
