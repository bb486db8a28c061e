//! Sync domain: queue model, storage and remote contracts, processor.

mod action;
mod processor;
mod remote;
mod store;

pub use action::*;
pub use processor::*;
pub use remote::*;
pub use store::*;
