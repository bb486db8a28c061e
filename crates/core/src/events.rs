//! Event boundary between the sync engine and its collaborators.
//!
//! The engine emits events; UI layers subscribe. The engine never imports
//! notification code.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Failure category carried by [`SyncEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFailureKind {
    Network,
    Validation,
    Auth,
    Storage,
}

/// Events emitted by the sync processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncEvent {
    /// The drain reached an empty queue.
    Complete { applied: usize },
    /// A sync-time failure. Never log-only: every failed action surfaces here.
    Error {
        kind: SyncFailureKind,
        message: String,
        /// Sequence id of the affected action, when one is known.
        sequence_id: Option<i64>,
    },
}

/// Broadcast-backed subscription point for sync events.
#[derive(Debug, Clone)]
pub struct SyncEventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl SyncEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emitting with no live subscribers is not an error.
    pub fn emit(&self, event: SyncEvent) {
        if self.tx.send(event.clone()).is_err() {
            log::debug!("[Sync] No subscribers for event {:?}", event);
        }
    }
}

impl Default for SyncEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
