//! Chat domain merge.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use snapsync_types::{ChatMessage, ChatState, Session};

use super::{DomainMerge, MergeContext};

impl DomainMerge for ChatState {
    /// Reconcile sessions by id.
    ///
    /// - Remote sessions without messages are ignored.
    /// - A remote tombstone marks the local counterpart deleted.
    /// - A local tombstone is never lifted by a live remote copy.
    /// - Unknown remote sessions are adopted.
    /// - Shared live sessions union their messages by id, sorted by date.
    ///
    /// Tombstoned sessions are compacted out of the result, which is sorted
    /// by `last_update` descending.
    fn merge(local: &Self, remote: &Self, _ctx: &MergeContext) -> Self {
        let mut sessions: Vec<Session> = local.sessions.clone();
        let mut index: HashMap<String, usize> = HashMap::with_capacity(sessions.len());
        for (pos, session) in sessions.iter().enumerate() {
            index.entry(session.id.clone()).or_insert(pos);
        }

        for remote_session in &remote.sessions {
            if remote_session.is_ephemeral() {
                continue;
            }

            match index.get(&remote_session.id) {
                Some(&pos) => {
                    let local_session = &mut sessions[pos];
                    if remote_session.is_deleted {
                        local_session.is_deleted = true;
                    } else if !local_session.is_deleted {
                        local_session.messages =
                            union_messages(&local_session.messages, &remote_session.messages);
                    }
                }
                None => {
                    if remote_session.is_deleted {
                        continue;
                    }
                    index.insert(remote_session.id.clone(), sessions.len());
                    sessions.push(remote_session.clone());
                }
            }
        }

        let mut seen = HashSet::with_capacity(sessions.len());
        sessions.retain(|s| !s.is_deleted && seen.insert(s.id.clone()));
        for session in &mut sessions {
            dedupe_messages(&mut session.messages);
        }
        sessions.sort_by_key(|s| Reverse(s.last_update));

        ChatState {
            sessions,
            extra: local.extra.clone(),
        }
    }
}

/// Local messages first, then remote messages whose id is unknown locally,
/// sorted by date ascending. The sort is stable so equal dates keep their
/// arrival order.
fn union_messages(local: &[ChatMessage], remote: &[ChatMessage]) -> Vec<ChatMessage> {
    let known: HashSet<&str> = local.iter().map(|m| m.id.as_str()).collect();
    let mut merged = local.to_vec();
    merged.extend(
        remote
            .iter()
            .filter(|m| !known.contains(m.id.as_str()))
            .cloned(),
    );
    merged.sort_by_key(|m| m.date);
    merged
}

/// Keep the first message for each id.
fn dedupe_messages(messages: &mut Vec<ChatMessage>) {
    let mut seen = HashSet::with_capacity(messages.len());
    messages.retain(|m| seen.insert(m.id.clone()));
}
