//! Conversation turn domain types.
//!
//! A turn is one message-exchange unit of the host's chat history. The core
//! only ever reads a bounded suffix of the history; turns are owned by the
//! host's chat store and are immutable from our perspective.

use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The end user
    User,
    /// The character / assistant
    Assistant,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Ordinal position in the history (0-based)
    pub ordinal: usize,

    /// Display name of the author ("User", character name, ...)
    pub name: String,

    /// Who authored this turn
    pub role: Speaker,

    /// The display text of the turn
    pub text: String,

    /// Whether the turn was authored by the user
    pub is_user: bool,

    /// Response-variant (swipe) id currently displayed for this turn.
    /// Always 0 for user turns.
    pub variant: u32,
}

impl ConversationTurn {
    /// Create a user turn at the given position.
    pub fn user(ordinal: usize, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
            role: Speaker::User,
            text: text.into(),
            is_user: true,
            variant: 0,
        }
    }

    /// Create an assistant turn at the given position.
    pub fn assistant(ordinal: usize, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
            role: Speaker::Assistant,
            text: text.into(),
            is_user: false,
            variant: 0,
        }
    }

    /// Set the displayed response variant (builder-style).
    pub fn with_variant(mut self, variant: u32) -> Self {
        self.variant = variant;
        self
    }

    /// Render as a transcript line: `"{name}: {text}"`.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.name, self.text)
    }
}
