//! # Tidbit Core
//!
//! Domain types, traits, and error definitions for the Tidbit fact-generation
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every host collaborator (chat history, lore, persona, character, settings,
//! completion backends) is defined as a trait here. Implementations live in
//! the host adapter or in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod event;
pub mod fact;
pub mod source;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use backend::{BackendReply, ChatMessage, ChatRole, PrimaryBackend, ProfileBackend};
pub use error::{BackendError, Error, Result, SourceError, StoreError};
pub use event::{EventBus, FactEvent};
pub use fact::{FactKey, FactSet};
pub use source::{
    CharacterCard, CharacterProvider, ChatHistoryProvider, LoreEntry, LoreProvider, LoreScan,
    PersonaCard, PersonaProvider, SettingsStore,
};
pub use turn::{ConversationTurn, Speaker};
