//! Domain registry: handles to every live domain container.
//!
//! The orchestrator never reaches for global state. The host registers one
//! [`DomainStore`] per domain it owns and injects the registry.

use std::sync::{Arc, PoisonError, RwLock};

use snapsync_types::{DomainKey, DomainState, Snapshot};
use thiserror::Error;
use tracing::{debug, warn};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A domain container refused to hand out its state.
    #[error("failed to read {domain}: {reason}")]
    Read {
        /// The domain.
        domain: DomainKey,
        /// What went wrong.
        reason: String,
    },

    /// A domain container refused new state.
    #[error("failed to write {domain}: {reason}")]
    Write {
        /// The domain.
        domain: DomainKey,
        /// What went wrong.
        reason: String,
    },

    /// State for one domain was offered to another.
    #[error("{got} state written to the {expected} container")]
    WrongDomain {
        /// Domain of the container.
        expected: DomainKey,
        /// Domain of the offered state.
        got: DomainKey,
    },

    /// Two containers claim the same domain.
    #[error("domain {0} registered twice")]
    Duplicate(DomainKey),
}

/// Accessor pair for one domain's live state.
pub trait DomainStore: Send + Sync {
    /// The domain this container holds.
    fn key(&self) -> DomainKey;

    /// Copy out the current data.
    fn read(&self) -> Result<DomainState, RegistryError>;

    /// Replace the current data.
    fn write(&self, state: DomainState) -> Result<(), RegistryError>;
}

/// An in-process domain container.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct SharedDomain {
    key: DomainKey,
    state: Arc<RwLock<DomainState>>,
}

impl SharedDomain {
    /// Wrap an initial state.
    pub fn new(state: DomainState) -> Self {
        Self {
            key: state.key(),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Current state.
    pub fn get(&self) -> DomainState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DomainStore for SharedDomain {
    fn key(&self) -> DomainKey {
        self.key
    }

    fn read(&self) -> Result<DomainState, RegistryError> {
        Ok(self.get())
    }

    fn write(&self, state: DomainState) -> Result<(), RegistryError> {
        if state.key() != self.key {
            return Err(RegistryError::WrongDomain {
                expected: self.key,
                got: state.key(),
            });
        }
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
        Ok(())
    }
}

/// Every registered domain container, in registration order.
#[derive(Clone, Default)]
pub struct DomainRegistry {
    stores: Vec<Arc<dyn DomainStore>>,
}

impl std::fmt::Debug for DomainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainRegistry")
            .field("domains", &self.keys())
            .finish()
    }
}

impl DomainRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry backed by [`SharedDomain`] containers seeded from a
    /// snapshot, one per domain the snapshot carries.
    pub fn in_memory(snapshot: Snapshot) -> Self {
        let stores = snapshot
            .into_states()
            .into_iter()
            .map(|state| Arc::new(SharedDomain::new(state)) as Arc<dyn DomainStore>)
            .collect();
        Self { stores }
    }

    /// Register a domain container.
    pub fn register(&mut self, store: Arc<dyn DomainStore>) -> Result<(), RegistryError> {
        let key = store.key();
        if self.stores.iter().any(|s| s.key() == key) {
            return Err(RegistryError::Duplicate(key));
        }
        self.stores.push(store);
        Ok(())
    }

    /// Registered domains.
    pub fn keys(&self) -> Vec<DomainKey> {
        self.stores.iter().map(|s| s.key()).collect()
    }

    /// Read every registered domain into a fresh snapshot.
    pub fn snapshot(&self) -> Result<Snapshot, RegistryError> {
        let mut snapshot = Snapshot::new();
        for store in &self.stores {
            snapshot.insert(store.read()?);
        }
        Ok(snapshot)
    }

    /// Write every domain the snapshot carries back to its container.
    ///
    /// Domains are written one at a time. A failing domain does not stop
    /// the others; the first error is returned after all were attempted,
    /// and domains already written stay written.
    pub fn apply(&self, mut snapshot: Snapshot) -> Result<(), RegistryError> {
        let mut first_error = None;
        for store in &self.stores {
            let Some(state) = snapshot.take(store.key()) else {
                continue;
            };
            match store.write(state) {
                Ok(()) => debug!(domain = %store.key(), "domain applied"),
                Err(e) => {
                    warn!(domain = %store.key(), error = %e, "domain apply failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
