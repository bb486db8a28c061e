//! Pending-mutation model for the durable sync queue.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::models::{RecordPayload, SyncTable};

/// Mutation kinds replayed against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Insert,
    Update,
    Delete,
}

/// One queued, not-yet-acknowledged mutation. Immutable once enqueued;
/// removed only after a successful remote application or an explicit
/// permanent-failure abandonment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAction {
    /// Globally ordered across all tables, monotonically increasing.
    pub sequence_id: i64,
    pub table: SyncTable,
    pub action_type: ActionType,
    /// Raw record JSON as captured at mutation time.
    pub payload: serde_json::Value,
    pub created_at: String,
}

impl SyncAction {
    /// Id of the record this action targets.
    pub fn record_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(|value| value.as_str())
    }

    pub fn record(&self) -> Result<RecordPayload> {
        RecordPayload::from_table_json(self.table, self.payload.clone())
    }
}

/// A locally-made mutation, validated and written to the cache and the queue
/// in one step.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMutation {
    pub action_type: ActionType,
    pub payload: RecordPayload,
}

impl LocalMutation {
    pub fn new(action_type: ActionType, payload: RecordPayload) -> Self {
        Self {
            action_type,
            payload,
        }
    }

    pub fn table(&self) -> SyncTable {
        self.payload.table()
    }
}
