//! Chat domain state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The chat domain: every session the user has, most relevant first.
///
/// Fields the sync engine does not interpret (current selection, UI flags)
/// are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    /// Sessions, ordered by `last_update` descending after every merge.
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Non-merge fields of the chat store.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatState {
    /// Create a chat state holding the given sessions.
    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            extra: Map::new(),
        }
    }

    /// Find a session by id.
    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }
}

/// A chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable unique identifier.
    pub id: String,
    /// Display topic.
    #[serde(default)]
    pub topic: String,
    /// Messages, semantically ordered by `date` ascending.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Last modification time (epoch millis).
    #[serde(default)]
    pub last_update: i64,
    /// Tombstone: the session was deleted on some replica.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
    /// Display metadata (mask, stats, memory prompt, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Session {
    /// Create an empty session.
    pub fn new(id: impl Into<String>, last_update: i64) -> Self {
        Self {
            id: id.into(),
            topic: String::new(),
            messages: Vec::new(),
            last_update,
            is_deleted: false,
            extra: Map::new(),
        }
    }

    /// Append a message (builder style).
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Mark as deleted (builder style).
    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    /// A session without messages is never propagated by merge.
    pub fn is_ephemeral(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique within its session.
    pub id: String,
    /// Ordering timestamp (epoch millis). Not unique.
    #[serde(default)]
    pub date: i64,
    /// Author role (`user`, `assistant`, `system`).
    #[serde(default)]
    pub role: String,
    /// Content payload: plain text or a multimodal part list.
    #[serde(default)]
    pub content: Value,
    /// Everything else (streaming flags, model name, tool calls, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Create a text message.
    pub fn new(id: impl Into<String>, date: i64, role: &str, text: &str) -> Self {
        Self {
            id: id.into(),
            date,
            role: role.to_string(),
            content: Value::String(text.to_string()),
            extra: Map::new(),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
