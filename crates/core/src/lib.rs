//! Offline-first sync engine core.
//!
//! Serves reads from a local mirror, queues locally-made mutations durably,
//! and replays them against the remote store once connectivity returns.
//! Persistence and transport live in sibling crates behind the traits
//! defined here.

pub mod connectivity;
pub mod errors;
pub mod events;
pub mod models;
pub mod sync;

pub use errors::{Error, Result};
