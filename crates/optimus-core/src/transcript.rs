//! The durable conversation shown in the chat column.
//!
//! Entries are only ever appended. A streamed answer reaches the transcript as
//! a single assistant entry once its session completes; aborted or failed
//! sessions leave no trace here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The operator.
    User,
    /// The backend agent.
    Assistant,
}

impl Role {
    /// Label shown in the chat column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "OpsAgent",
        }
    }
}

/// One committed utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    id: MessageId,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl ChatEntry {
    /// Entry id.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Author of the entry.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Entry text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// When the entry was committed.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check if this is a user entry.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Ordered, append-only sequence of chat entries.
#[derive(Debug, Clone, Default)]
pub struct ChatTranscript {
    entries: Vec<ChatEntry>,
}

impl ChatTranscript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its id.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let id = self
            .entries
            .last()
            .map_or(MessageId::FIRST, |last| last.id.next());
        self.entries.push(ChatEntry {
            id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        });
        id
    }

    /// All entries in commit order.
    #[must_use]
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    /// Number of committed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been committed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
