//! # gateway-cache
//!
//! The boundary between the gateway session and whatever cache the embedding
//! application keeps.
//!
//! ## Features
//!
//! - **Store**: the single async entry point, fed one [`StoreAction`] per dispatch
//! - **Previous state**: every mutation reports what it replaced, so callers can diff
//! - **InMemoryStore**: reference implementation backed by `DashMap`
//! - **NoopStore**: for clients that keep no cache
//!
//! ## Example
//!
//! ```ignore
//! use gateway_cache::{InMemoryStore, Store, StoreAction, StoreActionKind};
//!
//! let store = InMemoryStore::new();
//! let previous = store
//!     .execute(StoreAction::new(0, StoreActionKind::UpsertChannel(channel)))
//!     .await?;
//! ```

pub mod memory;
pub mod noop;
pub mod store;

pub use memory::{CacheStats, InMemoryStore, DEFAULT_MESSAGE_WINDOW};
pub use noop::NoopStore;
pub use store::{
    CacheError, CacheExecutionError, CacheResult, InvalidationCause, PreviousState, SharedStore,
    Store, StoreAction, StoreActionKind,
};
