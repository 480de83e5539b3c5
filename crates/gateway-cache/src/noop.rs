//! Store that keeps nothing.

use crate::store::{CacheResult, PreviousState, Store, StoreAction};
use async_trait::async_trait;

/// Accepts every action and never reports previous state
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl Store for NoopStore {
    async fn execute(&self, _action: StoreAction) -> CacheResult<Option<PreviousState>> {
        Ok(None)
    }
}
