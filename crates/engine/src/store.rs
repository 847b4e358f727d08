//! Persistent fact storage over the host settings store.
//!
//! Fact sets live in memory keyed by [`FactKey`] and are mirrored to a
//! single settings entry as a JSON map keyed by the key's string form.
//! Every mutation writes through and asks the host to persist; the host
//! may debounce. Expiry runs once, at load.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tidbit_core::error::Result;
use tidbit_core::fact::{FactKey, FactSet};
use tidbit_core::source::SettingsStore;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The settings entry all fact sets are stored under.
const STORE_KEY: &str = "tmi_data";

/// In-memory fact map with write-through persistence.
pub struct FactStore {
    settings: Arc<dyn SettingsStore>,
    data: RwLock<HashMap<FactKey, FactSet>>,
}

impl FactStore {
    /// Load the store from the host settings, purging sets older than
    /// `retention_days`. Malformed entries are dropped with a warning
    /// rather than failing the load.
    pub async fn load(settings: Arc<dyn SettingsStore>, retention_days: i64) -> Result<Self> {
        let mut data = HashMap::new();
        let mut dropped = 0usize;

        if let Some(value) = settings.get(STORE_KEY).await? {
            let raw: HashMap<String, FactSet> = serde_json::from_value(value)?;
            let now = Utc::now();
            let max_age = Duration::days(retention_days);

            for (key_str, set) in raw {
                let key: FactKey = match key_str.parse() {
                    Ok(key) => key,
                    Err(e) => {
                        warn!("Dropping malformed fact key: {e}");
                        dropped += 1;
                        continue;
                    }
                };
                if set.age(now) > max_age {
                    debug!(key = %key, "Expiring stored fact set");
                    dropped += 1;
                    continue;
                }
                data.insert(key, set);
            }
        }

        let store = Self {
            settings,
            data: RwLock::new(data),
        };

        if dropped > 0 {
            info!(dropped, "Pruned stale fact sets at load");
            store.sync().await?;
        }

        Ok(store)
    }

    /// Number of stored fact sets.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Fetch the fact set for `key`, if any.
    pub async fn get(&self, key: &FactKey) -> Option<FactSet> {
        self.data.read().await.get(key).cloned()
    }

    /// Store (or overwrite) the fact set for `key` and persist.
    pub async fn record(&self, key: FactKey, set: FactSet) -> Result<()> {
        self.data.write().await.insert(key, set);
        self.sync().await
    }

    /// Remove the fact set for `key`. Returns whether one existed.
    pub async fn delete(&self, key: &FactKey) -> Result<bool> {
        let removed = self.data.write().await.remove(key).is_some();
        if removed {
            self.sync().await?;
        }
        Ok(removed)
    }

    /// Remove the fact sets of every variant of the given turn. Returns
    /// how many were removed.
    pub async fn delete_turn(&self, chat_id: &str, turn: usize) -> Result<usize> {
        let removed = {
            let mut data = self.data.write().await;
            let before = data.len();
            data.retain(|key, _| !(key.chat_id == chat_id && key.turn == turn));
            before - data.len()
        };
        if removed > 0 {
            self.sync().await?;
        }
        Ok(removed)
    }

    /// Flip the visibility flag for `key` and persist. Returns the new
    /// flag, or `None` when no set is stored under the key.
    pub async fn toggle_visibility(&self, key: &FactKey) -> Result<Option<bool>> {
        let flipped = {
            let mut data = self.data.write().await;
            data.get_mut(key).map(|set| {
                set.visible = !set.visible;
                set.visible
            })
        };
        if flipped.is_some() {
            self.sync().await?;
        }
        Ok(flipped)
    }

    /// All fact sets belonging to a chat, ordered by (turn, variant).
    pub async fn chat_sets(&self, chat_id: &str) -> Vec<(FactKey, FactSet)> {
        let data = self.data.read().await;
        let mut sets: Vec<(FactKey, FactSet)> = data
            .iter()
            .filter(|(key, _)| key.chat_id == chat_id)
            .map(|(key, set)| (key.clone(), set.clone()))
            .collect();
        sets.sort_by_key(|(key, _)| (key.turn, key.variant));
        sets
    }

    /// Remove every fact set belonging to a chat. Returns how many were
    /// removed.
    pub async fn clear_chat(&self, chat_id: &str) -> Result<usize> {
        let removed = {
            let mut data = self.data.write().await;
            let before = data.len();
            data.retain(|key, _| key.chat_id != chat_id);
            before - data.len()
        };
        if removed > 0 {
            self.sync().await?;
        }
        Ok(removed)
    }

    /// Remove everything and persist the empty map.
    pub async fn clear_all(&self) -> Result<()> {
        self.data.write().await.clear();
        self.sync().await
    }

    /// Mirror the in-memory map to the settings store and persist.
    async fn sync(&self) -> Result<()> {
        let snapshot: HashMap<String, FactSet> = self
            .data
            .read()
            .await
            .iter()
            .map(|(key, set)| (key.to_string(), set.clone()))
            .collect();
        let value = serde_json::to_value(snapshot)?;
        self.settings.set(STORE_KEY, value).await?;
        self.settings.persist().await?;
        Ok(())
    }
}
