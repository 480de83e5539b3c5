//! Ordered store execution

use super::actions::store_action;
use gateway_cache::{CacheExecutionError, PreviousState, SharedStore, StoreAction};
use gateway_core::Dispatch;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::{broadcast, oneshot};
use tracing::{trace, warn};

/// Default capacity of the cache-error channel
pub const DEFAULT_ERROR_BUFFER: usize = 256;

/// Applies dispatches to the injected store
///
/// Actions for one shard run strictly in the order [`apply`](Self::apply)
/// was called; actions for different shards may run concurrently.
pub struct DispatchBridge {
    store: SharedStore,
    /// Completion signal of the last action submitted per shard
    tails: Mutex<HashMap<u32, oneshot::Receiver<()>>>,
    errors: broadcast::Sender<CacheExecutionError>,
}

impl DispatchBridge {
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self::with_error_buffer(store, DEFAULT_ERROR_BUFFER)
    }

    #[must_use]
    pub fn with_error_buffer(store: SharedStore, buffer: usize) -> Self {
        let (errors, _) = broadcast::channel(buffer.max(1));
        Self {
            store,
            tails: Mutex::new(HashMap::new()),
            errors,
        }
    }

    /// Subscribe to cache failures
    pub fn cache_errors(&self) -> broadcast::Receiver<CacheExecutionError> {
        self.errors.subscribe()
    }

    /// Run `dispatch` through the store and return it with the replaced state
    ///
    /// The shard's place in line is taken before this returns, so the order of
    /// calls fixes the order of execution even if the futures are polled
    /// concurrently. A store failure is published on the error channel and
    /// yields `None`; it never fails the dispatch.
    pub fn apply(
        &self,
        shard: u32,
        dispatch: Dispatch,
    ) -> impl Future<Output = (Dispatch, Option<PreviousState>)> + Send + 'static {
        let job = store_action(&dispatch).map(|kind| {
            let (done, tail) = oneshot::channel();
            let previous = self.tails.lock().insert(shard, tail);
            (StoreAction::new(shard, kind), previous, done)
        });
        let store = self.store.clone();
        let errors = self.errors.clone();

        async move {
            let Some((action, previous, done)) = job else {
                return (dispatch, None);
            };

            if let Some(previous) = previous {
                // A dropped sender also means the predecessor is finished
                let _ = previous.await;
            }

            let name = action.kind.name();
            let result = store.execute(action).await;
            drop(done);

            match result {
                Ok(replaced) => {
                    trace!(shard, action = name, replaced = replaced.is_some(), "Cache updated");
                    (dispatch, replaced)
                }
                Err(source) => {
                    let error = CacheExecutionError {
                        shard,
                        event: dispatch.event_type(),
                        action: name,
                        source,
                    };
                    warn!(error = %error, "Cache execution failed");
                    let _ = errors.send(error);
                    (dispatch, None)
                }
            }
        }
    }
}

impl std::fmt::Debug for DispatchBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchBridge")
            .field("shards", &self.tails.lock().len())
            .field("error_subscribers", &self.errors.receiver_count())
            .finish_non_exhaustive()
    }
}
