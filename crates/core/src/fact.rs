//! Fact-set domain types.
//!
//! A `FactSet` is the result of one generation: a bounded, ordered list of
//! short fact strings attached to a specific (chat, turn, variant) identity.
//! Regenerating a turn or switching a response variant addresses a distinct
//! set, so the identity key is composite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Composite identity of a fact set: (chat id, turn ordinal, variant id).
///
/// Round-trips through `Display`/`FromStr` as `"{chat}:{turn}:{variant}"`
/// so it can serve as a JSON map key in the host settings store. Parsing
/// splits right-to-left, so chat ids containing `:` round-trip too; only
/// an empty chat id is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactKey {
    /// The owning conversation (chat file) id
    pub chat_id: String,

    /// Ordinal of the turn the facts belong to
    pub turn: usize,

    /// Response-variant (swipe) id of the turn
    pub variant: u32,
}

impl FactKey {
    pub fn new(chat_id: impl Into<String>, turn: usize, variant: u32) -> Self {
        Self {
            chat_id: chat_id.into(),
            turn,
            variant,
        }
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chat_id, self.turn, self.variant)
    }
}

impl FromStr for FactKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, ':');
        let variant = parts
            .next()
            .ok_or_else(|| format!("malformed fact key: {s}"))?
            .parse::<u32>()
            .map_err(|e| format!("bad variant in fact key {s:?}: {e}"))?;
        let turn = parts
            .next()
            .ok_or_else(|| format!("malformed fact key: {s}"))?
            .parse::<usize>()
            .map_err(|e| format!("bad turn in fact key {s:?}: {e}"))?;
        let chat_id = parts
            .next()
            .ok_or_else(|| format!("malformed fact key: {s}"))?;
        if chat_id.is_empty() {
            return Err(format!("empty chat id in fact key: {s}"));
        }
        Ok(Self::new(chat_id, turn, variant))
    }
}

/// The result of one successful generation.
///
/// Overwritten wholesale on regeneration; deleted when the owning turn is
/// deleted, by bulk clears, or by age-based expiry at store load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSet {
    /// Ordered fact strings (length bounded by the configured count)
    pub items: Vec<String>,

    /// Whether the facts are shown expanded in the host UI
    pub visible: bool,

    /// When this set was generated
    pub created_at: DateTime<Utc>,
}

impl FactSet {
    /// Create a fresh fact set with the current timestamp.
    pub fn new(items: Vec<String>, visible: bool) -> Self {
        Self {
            items,
            visible,
            created_at: Utc::now(),
        }
    }

    /// Age of this set relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}
