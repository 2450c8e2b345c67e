//! Sync cycle state machine.
//!
//! One cycle is `Idle -> Fetching -> (Bootstrapping | Merging) -> Uploading
//! -> Idle`. Any step may fail back to `Idle`. The machine is pure: it
//! consumes events and produces actions, and sync-client performs the I/O
//! each action names.

/// Where a sync cycle currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CyclePhase {
    /// No cycle running.
    #[default]
    Idle,
    /// Downloading the remote snapshot.
    Fetching,
    /// Remote was empty: uploading local state as the first copy.
    Bootstrapping,
    /// Decoding the remote snapshot and merging it into local state.
    Merging,
    /// Uploading the merged (or repaired) local snapshot.
    Uploading {
        /// Set when the remote payload could not be decoded and local state
        /// is being re-uploaded unmerged.
        repair_reason: Option<String>,
    },
}

impl CyclePhase {
    /// Create an idle machine.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new phase plus actions to execute.
    pub fn on_event(self, event: CycleEvent) -> (Self, Vec<CycleAction>) {
        match (self, event) {
            (Self::Idle, CycleEvent::Start) => (Self::Fetching, vec![CycleAction::FetchRemote]),

            // From Fetching
            (Self::Fetching, CycleEvent::RemoteEmpty) => {
                (Self::Bootstrapping, vec![CycleAction::UploadLocal])
            }
            (Self::Fetching, CycleEvent::RemoteFound) => {
                (Self::Merging, vec![CycleAction::DecodeRemote])
            }

            // From Merging
            (Self::Merging, CycleEvent::Merged) => (
                Self::Uploading {
                    repair_reason: None,
                },
                vec![CycleAction::UploadLocal],
            ),
            (Self::Merging, CycleEvent::DecodeFailed { error }) => (
                Self::Uploading {
                    repair_reason: Some(error),
                },
                vec![CycleAction::UploadLocal],
            ),

            // Upload finished
            (Self::Bootstrapping, CycleEvent::Uploaded) => (
                Self::Idle,
                vec![
                    CycleAction::MarkSynced,
                    CycleAction::Notify(CycleNotice::Bootstrapped),
                ],
            ),
            (Self::Uploading { repair_reason }, CycleEvent::Uploaded) => {
                let notice = match repair_reason {
                    Some(error) => CycleNotice::Repaired { error },
                    None => CycleNotice::Synced,
                };
                (
                    Self::Idle,
                    vec![CycleAction::MarkSynced, CycleAction::Notify(notice)],
                )
            }

            // Any running step can fail
            (state, CycleEvent::Failed { error }) if state.is_running() => (
                Self::Idle,
                vec![CycleAction::Notify(CycleNotice::Failed { error })],
            ),

            // Invalid transitions - stay in current phase
            (state, _) => (state, vec![]),
        }
    }

    /// Whether a cycle is in progress.
    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Short lowercase label for logs and status output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Bootstrapping => "bootstrapping",
            Self::Merging => "merging",
            Self::Uploading { .. } => "uploading",
        }
    }
}

/// Results reported by sync-client after performing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEvent {
    /// A cycle was requested.
    Start,
    /// The remote store holds no snapshot.
    RemoteEmpty,
    /// The remote store returned a payload.
    RemoteFound,
    /// The remote snapshot was merged and applied locally.
    Merged,
    /// The remote payload could not be decoded.
    DecodeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The local snapshot was uploaded.
    Uploaded,
    /// A step failed fatally.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Work for sync-client to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    /// Download the remote snapshot.
    FetchRemote,
    /// Decode the fetched payload, merge it, apply the result.
    DecodeRemote,
    /// Encode the local snapshot and upload it.
    UploadLocal,
    /// Stamp `lastSyncTime` and `lastProvider`.
    MarkSynced,
    /// Tell the user how the cycle ended.
    Notify(CycleNotice),
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleNotice {
    /// First sync: local state is now the remote copy.
    Bootstrapped,
    /// Remote merged and uploaded.
    Synced,
    /// Remote was unreadable; local state was uploaded in its place.
    Repaired {
        /// The decode error.
        error: String,
    },
    /// The cycle failed.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}
