//! Result events — how the core tells its host what happened.
//!
//! The core never touches the host UI. When a generation settles (or stored
//! facts are restored) it publishes an event; the host subscribes and renders.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::fact::{FactKey, FactSet};

/// Everything the core reports back to its host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FactEvent {
    /// A fact set is ready for the given key — freshly generated or
    /// restored from the store.
    FactsReady { key: FactKey, facts: FactSet },

    /// Generation failed for the given key. `message` is user-presentable.
    FactsFailed { key: FactKey, message: String },
}

/// A broadcast-based event bus for fact events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Hosts can
/// attach several listeners (renderer, logger) without coordination.
pub struct EventBus {
    sender: broadcast::Sender<Arc<FactEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: FactEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FactEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
