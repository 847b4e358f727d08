//! The generation coordinator — composes the prompt, dispatches to the
//! configured backend, and extracts the fact list from the raw reply.
//!
//! Holds the in-flight guard: at most one generation per fact key at any
//! time. A duplicate request while the first is still running settles as
//! `Ok(None)` instead of issuing a second backend call.

use std::collections::HashSet;
use std::sync::Arc;

use tidbit_config::{GenerationSource, GeneratorConfig};
use tidbit_context::ContextBundle;
use tidbit_core::backend::{ChatMessage, PrimaryBackend, ProfileBackend};
use tidbit_core::error::{Error, Result};
use tidbit_core::fact::{FactKey, FactSet};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Dispatches generation requests and guards against duplicates.
pub struct Coordinator {
    primary: Option<Arc<dyn PrimaryBackend>>,
    profile: Option<Arc<dyn ProfileBackend>>,
    pending: Mutex<HashSet<FactKey>>,
}

impl Coordinator {
    /// Create a coordinator over the available backends. Either backend may
    /// be absent; dispatching to an absent one is a configuration error.
    pub fn new(
        primary: Option<Arc<dyn PrimaryBackend>>,
        profile: Option<Arc<dyn ProfileBackend>>,
    ) -> Self {
        Self {
            primary,
            profile,
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a generation for `key` is currently in flight.
    pub async fn is_pending(&self, key: &FactKey) -> bool {
        self.pending.lock().await.contains(key)
    }

    /// Run one generation for `key` over the assembled `bundle`.
    ///
    /// Returns `Ok(None)` when a generation for the same key is already in
    /// flight; the in-flight one will settle on its own. On success the
    /// returned fact set carries at most `config.prompt.fact_count` items
    /// and the configured initial visibility.
    pub async fn generate(
        &self,
        key: &FactKey,
        bundle: &ContextBundle,
        config: &GeneratorConfig,
    ) -> Result<Option<FactSet>> {
        {
            // Check and mark under one lock acquisition; no await between.
            let mut pending = self.pending.lock().await;
            if !pending.insert(key.clone()) {
                debug!(%key, "Generation already in flight, skipping duplicate");
                return Ok(None);
            }
        }

        let result = self.run(key, bundle, config).await;
        self.pending.lock().await.remove(key);
        result.map(Some)
    }

    async fn run(
        &self,
        key: &FactKey,
        bundle: &ContextBundle,
        config: &GeneratorConfig,
    ) -> Result<FactSet> {
        let instruction = tidbit_prompt::compose(&config.prompt.directive, &config.prompt);

        let raw = match config.source {
            GenerationSource::Main => self.via_primary(bundle, &instruction, config).await?,
            GenerationSource::Profile => self.via_profile(bundle, &instruction, config).await?,
        };

        debug!(%key, raw_len = raw.len(), "Backend reply received");

        let items = tidbit_extract::extract(&raw, config.prompt.fact_count).ok_or_else(|| {
            warn!(%key, "No fact list found in backend reply");
            Error::parse_failure(&raw)
        })?;

        Ok(FactSet::new(items, config.auto_open))
    }

    async fn via_primary(
        &self,
        bundle: &ContextBundle,
        instruction: &str,
        config: &GeneratorConfig,
    ) -> Result<String> {
        let backend = self.primary.as_ref().ok_or_else(|| Error::Config {
            message: "main generation selected but no primary backend is available".into(),
        })?;

        let text = backend
            .complete(&bundle.render(), instruction, config.prompt.max_tokens)
            .await?;
        Ok(text)
    }

    async fn via_profile(
        &self,
        bundle: &ContextBundle,
        instruction: &str,
        config: &GeneratorConfig,
    ) -> Result<String> {
        if config.profile_id.is_empty() {
            return Err(Error::Config {
                message: "profile generation selected but no connection profile is set".into(),
            });
        }
        let backend = self.profile.as_ref().ok_or_else(|| Error::Config {
            message: "profile generation selected but no profile backend is available".into(),
        })?;

        // System block, then the windowed history with its own roles, then
        // the instruction as the final user message.
        let mut messages = Vec::with_capacity(bundle.turns.len() + 2);
        let system = bundle.system_text();
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        for turn in &bundle.turns {
            let line = turn.transcript_line();
            messages.push(if turn.is_user {
                ChatMessage::user(line)
            } else {
                ChatMessage::assistant(line)
            });
        }
        messages.push(ChatMessage::user(instruction));

        let reply = backend
            .send(&config.profile_id, messages, config.prompt.max_tokens)
            .await?;
        Ok(reply.into_text())
    }
}
