//! Error taxonomy shared across the offline engine.

use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Local persistence failures. Fatal to the triggering write; the caller
/// never retries silently since a retried local write could duplicate
/// in-memory state.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Database internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A payload rejected at the cache store's write boundary.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported sync table '{0}'")]
    UnsupportedTable(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
