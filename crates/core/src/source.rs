//! Host collaborator traits — the data sources the core reads from.
//!
//! The core never owns chat history, character metadata, or settings
//! persistence; it consumes them through these narrow interfaces. Hosts
//! implement them against whatever store they already have.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{SourceError, StoreError};
use crate::turn::ConversationTurn;

/// Read access to the host's conversation history.
///
/// Append-only from the core's perspective: the core reads bounded
/// suffixes and individual turns, never mutates.
#[async_trait]
pub trait ChatHistoryProvider: Send + Sync {
    /// Stable id of the currently open conversation.
    fn chat_id(&self) -> String;

    /// Number of turns in the history.
    fn len(&self) -> usize;

    /// Whether the history is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch a single turn by ordinal, if it exists.
    fn turn(&self, ordinal: usize) -> Option<ConversationTurn>;

    /// Snapshot of all turns in order.
    fn turns(&self) -> Vec<ConversationTurn>;
}

/// A single lore-book entry attached to a character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoreEntry {
    /// The entry text
    pub content: String,

    /// Whether the entry is injected regardless of trigger matches
    #[serde(default)]
    pub always_active: bool,
}

/// Result of a world-lore scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreScan {
    /// Concatenated text of the matched entries, bounded by the scan's
    /// character budget.
    pub matched_text: String,
}

/// Trigger-based world-lore lookup.
#[async_trait]
pub trait LoreProvider: Send + Sync {
    /// Scan the given texts for trigger matches and return matched entry
    /// text bounded by `budget_chars`.
    ///
    /// When `dry_run` is true the scan must not mutate any host-side
    /// trigger or usage counters — generation here is speculative side
    /// content, not canonical dialogue.
    async fn scan(
        &self,
        texts: &[String],
        budget_chars: usize,
        dry_run: bool,
    ) -> std::result::Result<LoreScan, SourceError>;
}

/// The user persona block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaCard {
    pub name: String,
    pub description: String,
}

/// Read-only accessor for the active user persona.
#[async_trait]
pub trait PersonaProvider: Send + Sync {
    async fn persona(&self) -> std::result::Result<Option<PersonaCard>, SourceError>;
}

/// Free-text metadata of the active character.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterCard {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub personality: String,

    #[serde(default)]
    pub scenario: String,

    #[serde(default)]
    pub creator_notes: String,

    #[serde(default)]
    pub system_prompt: String,

    /// Lore entries embedded in the character card
    #[serde(default)]
    pub lore_entries: Vec<LoreEntry>,
}

/// Read-only accessor for the active character.
#[async_trait]
pub trait CharacterProvider: Send + Sync {
    async fn character(&self) -> std::result::Result<Option<CharacterCard>, SourceError>;
}

/// The host's key-value settings persistence.
///
/// Values are arbitrary JSON. The core calls `persist` after every
/// state-mutating operation (record, delete, visibility toggle) so the
/// host can debounce or batch as it sees fit.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> std::result::Result<Option<serde_json::Value>, StoreError>;

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> std::result::Result<(), StoreError>;

    async fn persist(&self) -> std::result::Result<(), StoreError>;
}
