//! # sync-types
//!
//! Data model for snapsync, the offline-first state synchronization engine.
//!
//! This crate provides the types shared by every snapsync crate:
//! - [`DomainKey`] - the fixed set of independently mergeable state partitions
//! - [`Snapshot`] - one instant of application state, domain by domain
//! - [`ChatState`], [`PromptState`], [`MaskState`], [`LwwRecord`] - per-domain state
//! - [`SyncMetadata`] - bookkeeping written after a successful cycle
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod catalog;
mod chat;
mod domain;
mod error;
mod metadata;
mod record;
mod snapshot;
mod time;

pub use catalog::{Mask, MaskState, Prompt, PromptState};
pub use chat::{ChatMessage, ChatState, Session};
pub use domain::DomainKey;
pub use error::SyncError;
pub use metadata::SyncMetadata;
pub use record::{LwwRecord, LAST_UPDATE_TIME_FIELD};
pub use snapshot::{DomainState, Snapshot};
pub use time::now_millis;
