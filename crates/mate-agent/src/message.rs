//! Conversation messages and snapshots exchanged with the reasoning process.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }

    /// Capitalized form used when a status line has nothing better to show.
    pub fn label(self) -> &'static str {
        match self {
            MessageRole::System => "System",
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
            MessageRole::Tool => "Tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation. `name` carries the originating agent for
/// assistant messages and the tool name for tool messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub name: Option<String>,
    pub content: String,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            name: None,
            content: content.into(),
        }
    }

    pub fn assistant(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            name: None,
            content: content.into(),
        }
    }
}

/// Full message history at one point during a turn. Snapshots grow
/// monotonically: each one is a superset of the previous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub messages: Vec<TurnMessage>,
}

impl ConversationSnapshot {
    pub fn new(messages: Vec<TurnMessage>) -> Self {
        Self { messages }
    }

    pub fn newest(&self) -> Option<&TurnMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Process-unique id with a caller-supplied prefix, used for thread and run
/// identifiers handed to web clients.
pub fn next_id(prefix: &str) -> String {
    let sequence = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let timestamp = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_millis().saturating_mul(1_000_000));
    let ts = u128::from(timestamp.unsigned_abs());
    format!(
        "{prefix}-{head:08x}-{mid:04x}-{tail:04x}",
        head = (ts & 0xffff_ffff),
        mid = ((ts >> 32) & 0xffff),
        tail = sequence & 0xffff,
    )
}
