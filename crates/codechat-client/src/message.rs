use std::fmt;

use chrono::{DateTime, Utc};

/// Stable identifier of a transcript entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MessageId(pub uuid::Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of a transcript entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Assistant reply still receiving content.
    Streaming,
    /// Frozen.
    Complete,
    /// Frozen with partial content after the exchange failed.
    Failed,
}

/// One entry of a conversation transcript.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    /// Source references reported by the service (`file.ext:line`).
    pub sources: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    /// Creates a frozen user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            sources: None,
            created_at: Utc::now(),
            status: MessageStatus::Complete,
        }
    }

    /// Creates an empty assistant reply that content will be appended to.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: String::new(),
            sources: None,
            created_at: Utc::now(),
            status: MessageStatus::Streaming,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == MessageStatus::Streaming
    }

    pub(crate) fn append(&mut self, delta: &str) {
        debug_assert!(self.is_in_flight(), "append to a frozen message");
        self.content.push_str(delta);
    }

    pub(crate) fn set_sources(&mut self, sources: Vec<String>) {
        self.sources = Some(sources);
    }

    pub(crate) fn freeze(&mut self, status: MessageStatus) {
        self.status = status;
    }
}

/// Aggregated answer of a completed exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Answer {
    /// Content deltas concatenated in arrival order.
    pub text: String,
    /// Last `sources` list received.
    pub sources: Vec<String>,
}

impl Answer {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.sources.is_empty()
    }
}
