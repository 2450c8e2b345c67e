//! The fixed set of state domains.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SyncError;

/// A named, independently mergeable partition of application state.
///
/// The set is closed: every snapshot on the wire uses these names as its
/// top-level keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainKey {
    /// Chat sessions and their messages.
    Chat,
    /// Access settings and provider credentials.
    Access,
    /// Application configuration.
    Config,
    /// Masks (persona presets), keyed by id.
    Mask,
    /// Prompt templates, keyed by id.
    Prompt,
}

impl DomainKey {
    /// Every domain, in registry order.
    pub const ALL: [DomainKey; 5] = [
        DomainKey::Chat,
        DomainKey::Access,
        DomainKey::Config,
        DomainKey::Mask,
        DomainKey::Prompt,
    ];

    /// Wire name of this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainKey::Chat => "chat",
            DomainKey::Access => "access",
            DomainKey::Config => "config",
            DomainKey::Mask => "mask",
            DomainKey::Prompt => "prompt",
        }
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SyncError::UnknownDomain(s.to_string()))
    }
}
