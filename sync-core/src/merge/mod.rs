//! Merge engine: one pure strategy per domain.
//!
//! Every strategy takes the local and remote state by reference and builds
//! a new value. Inputs are never mutated, so a caller that discards the
//! result is left with exactly the state it started from.
//!
//! | Domain | Strategy |
//! |---|---|
//! | chat | session union by id, tombstone propagation, message union by id |
//! | prompt, mask | key union, local wins on collision |
//! | config, access | last-write-wins by `lastUpdateTime` with recursive backfill |

mod catalog;
mod chat;
mod record;

pub use record::fill_missing;

use snapsync_types::Snapshot;

/// Inputs shared by every strategy during one merge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeContext {
    /// The merge moment (epoch millis). Stamped onto last-write-wins results.
    pub now: i64,
}

impl MergeContext {
    /// Create a context for a merge happening at `now`.
    pub fn at(now: i64) -> Self {
        Self { now }
    }
}

/// Reconcile one domain's local and remote state.
pub trait DomainMerge: Sized {
    /// Merge `remote` into `local`, returning a new value.
    fn merge(local: &Self, remote: &Self, ctx: &MergeContext) -> Self;
}

/// Reconcile whole snapshots.
///
/// The orchestrator holds one of these for its lifetime; [`DomainMerger`]
/// is the standard strategy set.
pub trait SnapshotMerge: Send + Sync {
    /// Merge `remote` into `local`, returning a new snapshot.
    fn merge(&self, local: &Snapshot, remote: &Snapshot, ctx: &MergeContext) -> Snapshot;
}

/// The standard per-domain strategy set.
///
/// Only domains present locally appear in the result: a domain the remote
/// carries but this replica does not hold has nowhere to be applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainMerger;

impl SnapshotMerge for DomainMerger {
    fn merge(&self, local: &Snapshot, remote: &Snapshot, ctx: &MergeContext) -> Snapshot {
        Snapshot {
            chat: merge_domain(&local.chat, &remote.chat, ctx),
            access: merge_domain(&local.access, &remote.access, ctx),
            config: merge_domain(&local.config, &remote.config, ctx),
            mask: merge_domain(&local.mask, &remote.mask, ctx),
            prompt: merge_domain(&local.prompt, &remote.prompt, ctx),
        }
    }
}

fn merge_domain<T: DomainMerge + Clone>(
    local: &Option<T>,
    remote: &Option<T>,
    ctx: &MergeContext,
) -> Option<T> {
    match (local, remote) {
        (Some(local), Some(remote)) => Some(T::merge(local, remote, ctx)),
        (Some(local), None) => Some(local.clone()),
        (None, _) => None,
    }
}
