//! The assembled context bundle.

use serde::{Deserialize, Serialize};
use tidbit_core::turn::ConversationTurn;

/// The assembled input to one generation. Built fresh per request; never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Rendered persona block, empty if unavailable
    pub persona: String,

    /// Rendered character block, empty if unavailable
    pub character: String,

    /// Rendered world-lore block, empty if nothing matched
    pub lore: String,

    /// The windowed recent-turn suffix, oldest first
    pub turns: Vec<ConversationTurn>,
}

impl ContextBundle {
    /// The metadata blocks (persona, character, lore) joined with section
    /// separators, empty blocks elided. Used as the system message for
    /// profile backends.
    pub fn system_text(&self) -> String {
        let sections: Vec<&str> = [
            self.persona.as_str(),
            self.character.as_str(),
            self.lore.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
        sections.join("\n\n")
    }

    /// The recent turns rendered as `"{speaker}: {text}"` lines joined by
    /// blank lines, trimmed.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(ConversationTurn::transcript_line)
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string()
    }

    /// The full flat rendering: metadata blocks then transcript, in fixed
    /// order. Used as the context string for the primary backend.
    pub fn render(&self) -> String {
        let transcript = self.transcript();
        let sections: Vec<String> = [self.system_text(), transcript]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        sections.join("\n\n")
    }

    /// Whether nothing at all was assembled.
    pub fn is_empty(&self) -> bool {
        self.persona.is_empty()
            && self.character.is_empty()
            && self.lore.is_empty()
            && self.turns.is_empty()
    }
}
