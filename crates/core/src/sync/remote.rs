//! Remote store adapter contract and failure classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::SyncFailureKind;
use crate::models::SyncTable;

/// Retry policy classification for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    /// Halt the drain; the action and everything behind it stay queued.
    Retryable,
    /// Drop the action, flag the record, keep draining.
    Permanent,
    /// Halt and pause further drains until re-authentication.
    ReauthRequired,
}

/// Categorized errors returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteStoreError {
    /// Transport unreachable or timed out; retried on the next drain.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote rejected the payload (validation or conflict); never
    /// retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or expired credentials.
    #[error("Auth error: {0}")]
    Auth(String),
}

impl RemoteStoreError {
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Network(_) => SyncRetryClass::Retryable,
            Self::Validation(_) => SyncRetryClass::Permanent,
            Self::Auth(_) => SyncRetryClass::ReauthRequired,
        }
    }

    pub fn failure_kind(&self) -> SyncFailureKind {
        match self {
            Self::Network(_) => SyncFailureKind::Network,
            Self::Validation(_) => SyncFailureKind::Validation,
            Self::Auth(_) => SyncFailureKind::Auth,
        }
    }
}

/// Classify an HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> SyncRetryClass {
    match status {
        401 | 403 => SyncRetryClass::ReauthRequired,
        408 | 425 | 429 => SyncRetryClass::Retryable,
        500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

/// External collaborator abstraction over the backend's create/update/delete
/// contract. Inserts are upserts by id on the remote side, so redelivering an
/// already-applied action never creates a duplicate entity.
#[async_trait]
pub trait RemoteStoreAdapter: Send + Sync {
    /// Returns the remote id of the created (or merged) entity.
    async fn insert(
        &self,
        table: SyncTable,
        payload: &serde_json::Value,
    ) -> Result<String, RemoteStoreError>;

    async fn update(
        &self,
        table: SyncTable,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), RemoteStoreError>;

    async fn delete(&self, table: SyncTable, id: &str) -> Result<(), RemoteStoreError>;
}
