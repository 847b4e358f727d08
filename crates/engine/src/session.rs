//! The host-facing session — one per open conversation.
//!
//! A session owns the wiring between the host callbacks and the pipeline:
//! context assembly, prompt composition, backend dispatch, extraction,
//! persistence, and event publishing. The host calls the `on_*` methods
//! from its own lifecycle hooks and subscribes to the event bus to render
//! results; the session never touches the host UI directly.

use std::sync::Arc;

use tidbit_config::GeneratorConfig;
use tidbit_core::error::{Error, Result};
use tidbit_core::event::{EventBus, FactEvent};
use tidbit_core::fact::FactKey;
use tidbit_core::source::{
    CharacterProvider, ChatHistoryProvider, LoreProvider, PersonaProvider, SettingsStore,
};
use tidbit_core::turn::ConversationTurn;
use tidbit_context::{AssemblyInput, ContextAssembler};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::store::FactStore;

/// The host collaborators a session reads from.
pub struct HostBindings {
    pub history: Arc<dyn ChatHistoryProvider>,
    pub lore: Arc<dyn LoreProvider>,
    pub persona: Arc<dyn PersonaProvider>,
    pub character: Arc<dyn CharacterProvider>,
}

/// One conversation's generation session.
pub struct Session {
    config: GeneratorConfig,
    host: HostBindings,
    assembler: ContextAssembler,
    coordinator: Coordinator,
    store: FactStore,
    bus: EventBus,
}

impl Session {
    /// Open a session: loads (and age-prunes) stored facts, then wires the
    /// pipeline against the given host bindings and backends.
    pub async fn open(
        config: GeneratorConfig,
        host: HostBindings,
        coordinator: Coordinator,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self> {
        let store = FactStore::load(settings, config.retention_days).await?;
        let assembler = ContextAssembler::new(&config);
        info!(
            chat = %host.history.chat_id(),
            stored = store.len().await,
            "Session opened"
        );

        Ok(Self {
            config,
            host,
            assembler,
            coordinator,
            store,
            bus: EventBus::default(),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Subscribe to result events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FactEvent>> {
        self.bus.subscribe()
    }

    // ── Host lifecycle callbacks ──────────────────────────────────────

    /// A turn finished rendering in the host. Character turns get their
    /// stored facts restored, or a fresh generation when auto-generate is
    /// on; user turns are ignored.
    pub async fn on_turn_rendered(&self, ordinal: usize) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let Some(turn) = self.host.history.turn(ordinal) else {
            return Ok(());
        };
        if turn.is_user {
            return Ok(());
        }

        let key = self.key_for(&turn);
        if let Some(facts) = self.store.get(&key).await {
            debug!(%key, "Restoring stored facts");
            self.bus.publish(FactEvent::FactsReady { key, facts });
            return Ok(());
        }

        if self.config.auto_generate {
            self.generate_for(key, ordinal).await?;
        }
        Ok(())
    }

    /// The host switched to another chat (or reloaded this one). Republish
    /// the stored fact sets matching currently visible turns, in turn
    /// order. Sets for pruned turns or non-displayed variants stay stored
    /// but silent.
    pub async fn on_history_switched(&self) {
        let chat_id = self.host.history.chat_id();
        let sets = self.store.chat_sets(&chat_id).await;
        let mut restored = 0usize;
        for (key, facts) in sets {
            let visible = self
                .host
                .history
                .turn(key.turn)
                .is_some_and(|turn| !turn.is_user && turn.variant == key.variant);
            if visible {
                self.bus.publish(FactEvent::FactsReady { key, facts });
                restored += 1;
            }
        }
        debug!(chat = %chat_id, restored, "Restored facts after history switch");
    }

    /// A turn's text was edited in place. The stored facts (if any) still
    /// address the same key; republish them, never regenerate implicitly.
    pub async fn on_turn_edited(&self, ordinal: usize) {
        self.restore_turn(ordinal).await;
    }

    /// The host switched to a different response variant of a turn. Facts
    /// are per-variant, so republish what the new variant has stored.
    pub async fn on_variant_switched(&self, ordinal: usize) {
        self.restore_turn(ordinal).await;
    }

    /// A turn was deleted. Purge the facts of every variant it had.
    pub async fn on_turn_deleted(&self, ordinal: usize) -> Result<()> {
        let chat_id = self.host.history.chat_id();
        let removed = self.store.delete_turn(&chat_id, ordinal).await?;
        if removed > 0 {
            debug!(chat = %chat_id, ordinal, removed, "Purged facts of deleted turn");
        }
        Ok(())
    }

    // ── Explicit user actions ─────────────────────────────────────────

    /// Generate facts for the turn at `ordinal`, replacing any stored set
    /// for its current variant.
    pub async fn regenerate(&self, ordinal: usize) -> Result<()> {
        let turn = self.character_turn(ordinal)?;
        let key = self.key_for(&turn);
        self.store.delete(&key).await?;
        self.generate_for(key, ordinal).await
    }

    /// Flip the expanded/collapsed state of the turn's facts. Returns the
    /// new state, or `None` when the turn has no stored facts.
    pub async fn toggle_visibility(&self, ordinal: usize) -> Result<Option<bool>> {
        let turn = self.character_turn(ordinal)?;
        self.store.toggle_visibility(&self.key_for(&turn)).await
    }

    /// Drop every stored fact set of the current chat.
    pub async fn clear_chat(&self) -> Result<usize> {
        let chat_id = self.host.history.chat_id();
        self.store.clear_chat(&chat_id).await
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn key_for(&self, turn: &ConversationTurn) -> FactKey {
        FactKey::new(self.host.history.chat_id(), turn.ordinal, turn.variant)
    }

    fn character_turn(&self, ordinal: usize) -> Result<ConversationTurn> {
        let turn = self
            .host
            .history
            .turn(ordinal)
            .ok_or_else(|| Error::Internal(format!("no turn at ordinal {ordinal}")))?;
        if turn.is_user {
            return Err(Error::Internal(format!(
                "turn {ordinal} is a user turn and has no facts"
            )));
        }
        Ok(turn)
    }

    async fn restore_turn(&self, ordinal: usize) {
        let Some(turn) = self.host.history.turn(ordinal) else {
            return;
        };
        if turn.is_user {
            return;
        }
        let key = self.key_for(&turn);
        if let Some(facts) = self.store.get(&key).await {
            self.bus.publish(FactEvent::FactsReady { key, facts });
        }
    }

    async fn generate_for(&self, key: FactKey, ordinal: usize) -> Result<()> {
        let input = AssemblyInput {
            history: self.host.history.as_ref(),
            lore: self.host.lore.as_ref(),
            persona: self.host.persona.as_ref(),
            character: self.host.character.as_ref(),
        };
        let bundle = self.assembler.assemble(&input, ordinal).await;

        match self.coordinator.generate(&key, &bundle, &self.config).await {
            Ok(Some(facts)) => {
                self.store.record(key.clone(), facts.clone()).await?;
                self.bus.publish(FactEvent::FactsReady { key, facts });
                Ok(())
            }
            Ok(None) => {
                // Already in flight; the first request will publish.
                Ok(())
            }
            Err(e) => {
                warn!(%key, "Generation failed: {e}");
                self.bus.publish(FactEvent::FactsFailed {
                    key,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
