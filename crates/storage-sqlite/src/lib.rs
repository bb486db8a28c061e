//! SQLite persistence for the offline engine: the cache tables, the durable
//! sync-action log, and the single-writer actor that keeps both consistent.

pub mod db;
pub mod errors;
pub mod offline;
pub mod schema;

pub use db::{create_pool, get_connection, DbPool, DbConnection, WriteHandle};
pub use offline::{RecordSyncState, SqliteOfflineStore};
