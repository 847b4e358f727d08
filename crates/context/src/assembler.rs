//! The context assembler — fetches and renders the four context blocks.

use tidbit_config::GeneratorConfig;
use tidbit_core::source::{
    CharacterCard, CharacterProvider, ChatHistoryProvider, LoreProvider, PersonaProvider,
};
use tidbit_core::turn::ConversationTurn;
use tracing::{debug, warn};

use crate::bundle::ContextBundle;

/// When no lore entry on a character card is marked always-active, the
/// first few entries are taken as a bounded fallback.
const CARD_LORE_FALLBACK: usize = 3;

/// All collaborators required for a single assembly.
pub struct AssemblyInput<'a> {
    /// The conversation history.
    pub history: &'a dyn ChatHistoryProvider,
    /// World-lore lookup.
    pub lore: &'a dyn LoreProvider,
    /// User persona accessor.
    pub persona: &'a dyn PersonaProvider,
    /// Character card accessor.
    pub character: &'a dyn CharacterProvider,
}

/// The context assembler. Stateless between calls — create one per
/// configuration and reuse it.
pub struct ContextAssembler {
    context_turns: usize,
    lore_budget_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler bound to the given configuration.
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            context_turns: config.prompt.context_turns,
            lore_budget_chars: config.lore_budget_chars,
        }
    }

    /// Assemble the context for the turn at `upto` (inclusive).
    ///
    /// Each block fetch failure is caught, logged, and rendered as an
    /// empty block; assembly itself never fails.
    pub async fn assemble(&self, input: &AssemblyInput<'_>, upto: usize) -> ContextBundle {
        let persona = self.persona_block(input).await;
        let character = self.character_block(input).await;
        let lore = self.lore_block(input).await;
        let turns = self.window(input.history, upto);

        debug!(
            persona = !persona.is_empty(),
            character = !character.is_empty(),
            lore = !lore.is_empty(),
            turns = turns.len(),
            "Assembled context"
        );

        ContextBundle {
            persona,
            character,
            lore,
            turns,
        }
    }

    // ── Block renderers ───────────────────────────────────────────────

    async fn persona_block(&self, input: &AssemblyInput<'_>) -> String {
        match input.persona.persona().await {
            Ok(Some(persona)) => {
                let mut block = format!("[Persona]\nName: {}", persona.name);
                if !persona.description.is_empty() {
                    block.push('\n');
                    block.push_str(&persona.description);
                }
                block
            }
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Persona fetch failed, continuing without: {e}");
                String::new()
            }
        }
    }

    async fn character_block(&self, input: &AssemblyInput<'_>) -> String {
        match input.character.character().await {
            Ok(Some(card)) => Self::render_character(&card),
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Character fetch failed, continuing without: {e}");
                String::new()
            }
        }
    }

    fn render_character(card: &CharacterCard) -> String {
        let mut block = format!("[Character]\nName: {}", card.name);

        for (label, value) in [
            ("Description", &card.description),
            ("Personality", &card.personality),
            ("Scenario", &card.scenario),
            ("Creator Notes", &card.creator_notes),
            ("System Prompt", &card.system_prompt),
        ] {
            if !value.is_empty() {
                block.push_str(&format!("\n{label}: {value}"));
            }
        }

        let mut active: Vec<&str> = card
            .lore_entries
            .iter()
            .filter(|e| e.always_active)
            .map(|e| e.content.as_str())
            .collect();
        if active.is_empty() {
            // Bounded fallback when nothing is marked always-active
            active = card
                .lore_entries
                .iter()
                .take(CARD_LORE_FALLBACK)
                .map(|e| e.content.as_str())
                .collect();
        }
        if !active.is_empty() {
            block.push_str("\nLore:");
            for entry in active {
                block.push_str(&format!("\n- {entry}"));
            }
        }

        block
    }

    async fn lore_block(&self, input: &AssemblyInput<'_>) -> String {
        let texts: Vec<String> = input
            .history
            .turns()
            .into_iter()
            .map(|t| t.text)
            .collect();

        // Dry run: speculative side content must not advance the host's
        // trigger/usage counters.
        match input.lore.scan(&texts, self.lore_budget_chars, true).await {
            Ok(scan) if !scan.matched_text.is_empty() => {
                format!("[World Lore]\n{}", scan.matched_text)
            }
            Ok(_) => String::new(),
            Err(e) => {
                warn!("Lore scan failed, continuing without: {e}");
                String::new()
            }
        }
    }

    /// Suffix of the history ending at `upto`, at most `context_turns`
    /// long, start index clamped at 0.
    fn window(&self, history: &dyn ChatHistoryProvider, upto: usize) -> Vec<ConversationTurn> {
        if self.context_turns == 0 {
            return Vec::new();
        }
        let start = (upto + 1).saturating_sub(self.context_turns);
        (start..=upto).filter_map(|i| history.turn(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tidbit_core::error::SourceError;
    use tidbit_core::source::{LoreEntry, LoreScan, PersonaCard};
    use tidbit_core::turn::ConversationTurn;

    // ── Stub collaborators ─────────────────────────────────────────────

    struct StubHistory {
        turns: Vec<ConversationTurn>,
    }

    impl StubHistory {
        fn of(count: usize) -> Self {
            let turns = (0..count)
                .map(|i| {
                    if i % 2 == 0 {
                        ConversationTurn::user(i, "Alice", format!("question {i}"))
                    } else {
                        ConversationTurn::assistant(i, "Mira", format!("answer {i}"))
                    }
                })
                .collect();
            Self { turns }
        }
    }

    #[async_trait]
    impl ChatHistoryProvider for StubHistory {
        fn chat_id(&self) -> String {
            "chat_test".into()
        }
        fn len(&self) -> usize {
            self.turns.len()
        }
        fn turn(&self, ordinal: usize) -> Option<ConversationTurn> {
            self.turns.get(ordinal).cloned()
        }
        fn turns(&self) -> Vec<ConversationTurn> {
            self.turns.clone()
        }
    }

    #[derive(Default)]
    struct StubLore {
        matched: String,
        fail: bool,
    }

    #[async_trait]
    impl LoreProvider for StubLore {
        async fn scan(
            &self,
            _texts: &[String],
            _budget_chars: usize,
            dry_run: bool,
        ) -> Result<LoreScan, SourceError> {
            assert!(dry_run, "assembler must scan in dry-run mode");
            if self.fail {
                return Err(SourceError::Unavailable("lore index offline".into()));
            }
            Ok(LoreScan {
                matched_text: self.matched.clone(),
            })
        }
    }

    #[derive(Default)]
    struct StubPersona {
        card: Option<PersonaCard>,
        fail: bool,
    }

    #[async_trait]
    impl PersonaProvider for StubPersona {
        async fn persona(&self) -> Result<Option<PersonaCard>, SourceError> {
            if self.fail {
                return Err(SourceError::LookupFailed("persona store".into()));
            }
            Ok(self.card.clone())
        }
    }

    #[derive(Default)]
    struct StubCharacter {
        card: Option<CharacterCard>,
    }

    #[async_trait]
    impl CharacterProvider for StubCharacter {
        async fn character(&self) -> Result<Option<CharacterCard>, SourceError> {
            Ok(self.card.clone())
        }
    }

    fn assembler() -> ContextAssembler {
        ContextAssembler::new(&GeneratorConfig::default())
    }

    fn mira_card(entries: Vec<LoreEntry>) -> CharacterCard {
        CharacterCard {
            name: "Mira".into(),
            description: "An innkeeper".into(),
            personality: "warm but guarded".into(),
            scenario: String::new(),
            creator_notes: String::new(),
            system_prompt: String::new(),
            lore_entries: entries,
        }
    }

    // ── Tests ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn blocks_appear_in_fixed_order() {
        let history = StubHistory::of(2);
        let lore = StubLore {
            matched: "The tavern predates the town.".into(),
            fail: false,
        };
        let persona = StubPersona {
            card: Some(PersonaCard {
                name: "Alice".into(),
                description: "A wandering scribe".into(),
            }),
            fail: false,
        };
        let character = StubCharacter {
            card: Some(mira_card(vec![])),
        };

        let input = AssemblyInput {
            history: &history,
            lore: &lore,
            persona: &persona,
            character: &character,
        };
        let bundle = assembler().assemble(&input, 1).await;
        let rendered = bundle.render();

        let persona_at = rendered.find("[Persona]").unwrap();
        let character_at = rendered.find("[Character]").unwrap();
        let lore_at = rendered.find("[World Lore]").unwrap();
        let transcript_at = rendered.find("Alice: question 0").unwrap();
        assert!(persona_at < character_at);
        assert!(character_at < lore_at);
        assert!(lore_at < transcript_at);
    }

    #[tokio::test]
    async fn provider_failure_yields_empty_block() {
        let history = StubHistory::of(2);
        let lore = StubLore {
            matched: String::new(),
            fail: true,
        };
        let persona = StubPersona {
            card: None,
            fail: true,
        };
        let character = StubCharacter { card: None };

        let input = AssemblyInput {
            history: &history,
            lore: &lore,
            persona: &persona,
            character: &character,
        };
        let bundle = assembler().assemble(&input, 1).await;

        assert!(bundle.persona.is_empty());
        assert!(bundle.lore.is_empty());
        assert_eq!(bundle.turns.len(), 2);
    }

    #[tokio::test]
    async fn always_active_entries_win() {
        let history = StubHistory::of(1);
        let character = StubCharacter {
            card: Some(mira_card(vec![
                LoreEntry {
                    content: "triggered entry".into(),
                    always_active: false,
                },
                LoreEntry {
                    content: "pinned entry".into(),
                    always_active: true,
                },
            ])),
        };
        let input = AssemblyInput {
            history: &history,
            lore: &StubLore::default(),
            persona: &StubPersona::default(),
            character: &character,
        };
        let bundle = assembler().assemble(&input, 0).await;
        assert!(bundle.character.contains("- pinned entry"));
        assert!(!bundle.character.contains("- triggered entry"));
    }

    #[tokio::test]
    async fn card_lore_fallback_takes_first_three() {
        let history = StubHistory::of(1);
        let entries = (0..5)
            .map(|i| LoreEntry {
                content: format!("entry {i}"),
                always_active: false,
            })
            .collect();
        let character = StubCharacter {
            card: Some(mira_card(entries)),
        };
        let input = AssemblyInput {
            history: &history,
            lore: &StubLore::default(),
            persona: &StubPersona::default(),
            character: &character,
        };
        let bundle = assembler().assemble(&input, 0).await;
        assert!(bundle.character.contains("- entry 0"));
        assert!(bundle.character.contains("- entry 2"));
        assert!(!bundle.character.contains("- entry 3"));
    }

    #[tokio::test]
    async fn window_is_clamped_at_start() {
        let history = StubHistory::of(5);
        let input = AssemblyInput {
            history: &history,
            lore: &StubLore::default(),
            persona: &StubPersona::default(),
            character: &StubCharacter::default(),
        };
        // upto = 2 with a 20-turn window: starts at 0, three turns
        let bundle = assembler().assemble(&input, 2).await;
        assert_eq!(bundle.turns.len(), 3);
        assert_eq!(bundle.turns[0].ordinal, 0);
        assert_eq!(bundle.turns[2].ordinal, 2);
    }

    #[tokio::test]
    async fn window_respects_configured_length() {
        let history = StubHistory::of(30);
        let mut config = GeneratorConfig::default();
        config.prompt.context_turns = 4;
        let asm = ContextAssembler::new(&config);
        let input = AssemblyInput {
            history: &history,
            lore: &StubLore::default(),
            persona: &StubPersona::default(),
            character: &StubCharacter::default(),
        };
        let bundle = asm.assemble(&input, 29).await;
        assert_eq!(bundle.turns.len(), 4);
        assert_eq!(bundle.turns[0].ordinal, 26);
        assert_eq!(bundle.turns[3].ordinal, 29);
    }

    #[tokio::test]
    async fn zero_window_yields_no_turns() {
        let history = StubHistory::of(5);
        let mut config = GeneratorConfig::default();
        config.prompt.context_turns = 0;
        let asm = ContextAssembler::new(&config);
        let input = AssemblyInput {
            history: &history,
            lore: &StubLore::default(),
            persona: &StubPersona::default(),
            character: &StubCharacter::default(),
        };
        let bundle = asm.assemble(&input, 4).await;
        assert!(bundle.turns.is_empty());
    }

    #[tokio::test]
    async fn assembly_is_idempotent() {
        let history = StubHistory::of(6);
        let lore = StubLore {
            matched: "stable lore".into(),
            fail: false,
        };
        let persona = StubPersona {
            card: Some(PersonaCard {
                name: "Alice".into(),
                description: "scribe".into(),
            }),
            fail: false,
        };
        let character = StubCharacter {
            card: Some(mira_card(vec![])),
        };
        let input = AssemblyInput {
            history: &history,
            lore: &lore,
            persona: &persona,
            character: &character,
        };

        let asm = assembler();
        let first = asm.assemble(&input, 5).await;
        let second = asm.assemble(&input, 5).await;
        assert_eq!(first, second);
        assert_eq!(first.render(), second.render());
    }
}
