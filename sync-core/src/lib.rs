//! # sync-core
//!
//! Pure logic for snapsync (no I/O, instant tests).
//!
//! This crate implements the merge strategies, upload planning and the
//! sync-cycle state machine without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. Merge strategies never mutate their inputs, so a
//! cycle that fails after merging leaves the caller's original snapshot
//! untouched.
//!
//! The actual I/O (network, disk) is performed by `sync-client`, which
//! interprets the actions produced by [`CyclePhase`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod chunk;
pub mod cycle;
pub mod merge;

pub use backoff::retry_delay;
pub use chunk::{
    plan_chunks, ByteRange, ChunkError, ChunkPolicy, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_PAYLOAD,
    DEFAULT_MAX_RETRIES,
};
pub use cycle::{CycleAction, CycleEvent, CycleNotice, CyclePhase};
pub use merge::{fill_missing, DomainMerge, DomainMerger, MergeContext, SnapshotMerge};
