//! Identifier types for the console.
//!
//! Stream sessions are tagged with random UUIDs so that bytes still in flight
//! from a superseded transfer can be told apart from the active one. Transcript
//! entries use small sequential numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 16-byte stream session identifier based on UUID v4.
///
/// A fresh `SessionId` is generated for every request; two sessions never
/// share one, even within the same conversation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a new random `SessionId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// First eight hex digits, shown in the status bar.
    #[must_use]
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential identifier of a transcript entry (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// The first id handed out by a transcript.
    pub(crate) const FIRST: Self = Self(1);

    /// The id following this one.
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Return the raw number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}
