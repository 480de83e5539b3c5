//! Shard groups
//!
//! Shards that partition one event stream share a [`ShardGroup`]. When one of
//! them gives up, the group trips and every sibling stops with a partial
//! disconnect instead of resuming on its own.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Shared failure flag for a set of shards
#[derive(Debug, Clone)]
pub struct ShardGroup {
    /// Index of the shard that tripped the group
    tripped_by: Arc<watch::Sender<Option<u32>>>,
}

impl Default for ShardGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardGroup {
    #[must_use]
    pub fn new() -> Self {
        let (tripped_by, _) = watch::channel(None);
        Self {
            tripped_by: Arc::new(tripped_by),
        }
    }

    /// Mark the group failed; the first shard to trip it is kept
    ///
    /// Returns `true` if this call tripped the group.
    pub fn trip(&self, shard: u32) -> bool {
        let tripped = self.tripped_by.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(shard);
            true
        });
        if tripped {
            warn!(shard, "Shard group tripped");
        }
        tripped
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped_by.borrow().is_some()
    }

    /// Shard that tripped the group, if any
    #[must_use]
    pub fn tripped_by(&self) -> Option<u32> {
        *self.tripped_by.borrow()
    }

    /// Resolve once the group has tripped
    pub async fn tripped(&self) {
        let mut rx = self.tripped_by.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(Option::is_some).await;
    }
}
