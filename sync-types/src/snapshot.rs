//! Snapshot: every domain's state at one instant.

use serde::{Deserialize, Serialize};

use crate::{ChatState, DomainKey, LwwRecord, MaskState, PromptState, SyncError};

/// The state of one domain.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainState {
    /// Chat sessions.
    Chat(ChatState),
    /// Access settings.
    Access(LwwRecord),
    /// App configuration.
    Config(LwwRecord),
    /// Masks.
    Mask(MaskState),
    /// Prompts.
    Prompt(PromptState),
}

impl DomainState {
    /// Which domain this state belongs to.
    pub fn key(&self) -> DomainKey {
        match self {
            DomainState::Chat(_) => DomainKey::Chat,
            DomainState::Access(_) => DomainKey::Access,
            DomainState::Config(_) => DomainKey::Config,
            DomainState::Mask(_) => DomainKey::Mask,
            DomainState::Prompt(_) => DomainKey::Prompt,
        }
    }
}

/// A mapping from domain to domain state.
///
/// Serialized as a JSON object whose keys are the domain names. A domain
/// may be absent: remote snapshots written by a filtered upload, or by an
/// older build, only carry some domains.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Chat domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatState>,
    /// Access domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<LwwRecord>,
    /// Config domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<LwwRecord>,
    /// Mask domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<MaskState>,
    /// Prompt domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptState>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from domain states. Later states replace earlier
    /// ones of the same domain.
    pub fn from_states(states: impl IntoIterator<Item = DomainState>) -> Self {
        let mut snapshot = Self::new();
        for state in states {
            snapshot.insert(state);
        }
        snapshot
    }

    /// Insert a domain state, returning the one it replaced.
    pub fn insert(&mut self, state: DomainState) -> Option<DomainState> {
        match state {
            DomainState::Chat(s) => self.chat.replace(s).map(DomainState::Chat),
            DomainState::Access(s) => self.access.replace(s).map(DomainState::Access),
            DomainState::Config(s) => self.config.replace(s).map(DomainState::Config),
            DomainState::Mask(s) => self.mask.replace(s).map(DomainState::Mask),
            DomainState::Prompt(s) => self.prompt.replace(s).map(DomainState::Prompt),
        }
    }

    /// Remove and return a domain's state.
    pub fn take(&mut self, key: DomainKey) -> Option<DomainState> {
        match key {
            DomainKey::Chat => self.chat.take().map(DomainState::Chat),
            DomainKey::Access => self.access.take().map(DomainState::Access),
            DomainKey::Config => self.config.take().map(DomainState::Config),
            DomainKey::Mask => self.mask.take().map(DomainState::Mask),
            DomainKey::Prompt => self.prompt.take().map(DomainState::Prompt),
        }
    }

    /// Whether the snapshot carries a domain.
    pub fn contains(&self, key: DomainKey) -> bool {
        match key {
            DomainKey::Chat => self.chat.is_some(),
            DomainKey::Access => self.access.is_some(),
            DomainKey::Config => self.config.is_some(),
            DomainKey::Mask => self.mask.is_some(),
            DomainKey::Prompt => self.prompt.is_some(),
        }
    }

    /// Domains present, in registry order.
    pub fn keys(&self) -> Vec<DomainKey> {
        DomainKey::ALL
            .into_iter()
            .filter(|key| self.contains(*key))
            .collect()
    }

    /// True when no domain is present.
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// A copy with the given domains removed.
    pub fn without(&self, excluded: &[DomainKey]) -> Snapshot {
        let mut filtered = self.clone();
        for key in excluded {
            filtered.take(*key);
        }
        filtered
    }

    /// Consume into domain states, in registry order.
    pub fn into_states(mut self) -> Vec<DomainState> {
        DomainKey::ALL
            .into_iter()
            .filter_map(|key| self.take(key))
            .collect()
    }

    /// Serialize to compact JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::Serialization)
    }

    /// Serialize to indented JSON text.
    pub fn to_json_pretty(&self) -> Result<String, SyncError> {
        serde_json::to_string_pretty(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(SyncError::Deserialization)
    }
}
