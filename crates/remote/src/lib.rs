//! REST backend adapter: applies queued actions against the remote store and
//! probes transport reachability for the connectivity monitor.

pub mod client;
pub mod probe;

pub use client::RestRemoteStore;
pub use probe::HttpProbe;
