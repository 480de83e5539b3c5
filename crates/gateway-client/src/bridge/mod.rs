//! Dispatch-to-cache bridge
//!
//! Turns each decoded dispatch into a store action, runs it against the
//! injected [`Store`](gateway_cache::Store) in per-shard order, and hands the
//! replaced state back with the dispatch.

mod actions;
mod dispatcher;

pub use actions::store_action;
pub use dispatcher::{DispatchBridge, DEFAULT_ERROR_BUFFER};
