//! Storage contracts implemented by the persistence layer.

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{CacheFilter, RecordPayload, SyncTable};
use crate::sync::action::{LocalMutation, SyncAction};

/// Local mirror of remote entities. Reads are served directly from local
/// persistence and are never blocked by an in-progress drain.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn get(&self, table: SyncTable, id: &str) -> Result<Option<RecordPayload>>;

    /// Unordered unless the table defines a natural order.
    fn query(&self, filter: &CacheFilter) -> Result<Vec<RecordPayload>>;

    /// Upsert by id. `synced` marks whether the row mirrors acknowledged
    /// remote state.
    async fn put(&self, record: RecordPayload, synced: bool) -> Result<()>;

    /// Reference-data seeding; rows are written as already synced.
    async fn bulk_put(&self, records: Vec<RecordPayload>) -> Result<()>;

    async fn delete(&self, table: SyncTable, id: &str) -> Result<()>;

    async fn mark_synced(&self, table: SyncTable, id: &str) -> Result<()>;

    /// Sets the user-visible marker for a permanently rejected mutation.
    async fn flag_sync_error(&self, table: SyncTable, id: &str) -> Result<()>;

    /// Wipes all cached rows and pending actions.
    async fn clear(&self) -> Result<()>;
}

/// Durable, append-only, globally ordered log of pending mutations. Must
/// survive process restarts.
#[async_trait]
pub trait SyncQueue: Send + Sync {
    /// Appends one action; returns its monotonically increasing sequence id.
    async fn enqueue(&self, mutation: LocalMutation) -> Result<i64>;

    fn peek_next(&self) -> Result<Option<SyncAction>>;

    async fn remove(&self, sequence_id: i64) -> Result<()>;

    /// Diagnostics/UI surface, in queue order.
    fn list(&self) -> Result<Vec<SyncAction>>;
}

/// The combined store the engine drains. `record_local_mutation` is the
/// upward-facing write entry point: optimistic cache write plus queue append
/// in one transaction, so a crash can never leave one without the other.
#[async_trait]
pub trait OfflineStore: CacheStore + SyncQueue {
    async fn record_local_mutation(&self, mutation: LocalMutation) -> Result<i64>;
}
