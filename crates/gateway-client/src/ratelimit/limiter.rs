//! Outbound token bucket
//!
//! Each admission takes one token and schedules its own release exactly one
//! refill period later. There is no batch refill, so at most `capacity` items
//! pass in any window of one period, however bursty the callers are.

use dashmap::DashMap;
use std::future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Token bucket gating the outbound frame sequence
///
/// Cheap to clone; clones share one bucket. Dropping the last clone closes
/// the bucket and aborts pending releases.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    capacity: u32,
    refill_period: Duration,
    remaining: AtomicU32,
    closed: AtomicBool,
    available: Notify,
    /// Pending release timers keyed by grant id
    releases: DashMap<u64, JoinHandle<()>>,
    next_grant: AtomicU64,
}

impl RateLimiter {
    /// Create a bucket holding `capacity` tokens, each returned `refill_period`
    /// after it is taken
    #[must_use]
    pub fn new(capacity: u32, refill_period: Duration) -> Self {
        Self {
            inner: Arc::new(Bucket {
                capacity,
                refill_period,
                remaining: AtomicU32::new(capacity),
                closed: AtomicBool::new(false),
                available: Notify::new(),
                releases: DashMap::new(),
                next_grant: AtomicU64::new(0),
            }),
        }
    }

    /// Wait for a token, then hand `item` back
    ///
    /// Never resolves once the limiter is closed. Dropping the future before it
    /// resolves takes no token.
    pub async fn admit<T>(&self, item: T) -> T {
        let bucket = &self.inner;

        loop {
            let notified = bucket.available.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            if bucket.closed.load(Ordering::Acquire) {
                return future::pending().await;
            }

            // Take the token and schedule its return in one synchronous step
            if bucket.try_take() {
                Bucket::schedule_release(bucket);
                return item;
            }

            notified.await;
        }
    }

    /// Close the limiter: pending releases are dropped and every current and
    /// future `admit` stays pending
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let aborted = self.inner.abort_releases();
        self.inner.available.notify_waiters();
        debug!(aborted, "Rate limiter closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.inner.capacity
    }

    #[must_use]
    pub fn refill_period(&self) -> Duration {
        self.inner.refill_period
    }

    /// Tokens that can be taken right now
    #[must_use]
    pub fn available(&self) -> u32 {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Tokens taken and not yet returned
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.releases.len()
    }
}

impl Bucket {
    fn try_take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }

    fn schedule_release(bucket: &Arc<Self>) {
        let id = bucket.next_grant.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<Self> = Arc::downgrade(bucket);
        let period = bucket.refill_period;

        // Holding the vacant slot keeps the release from removing its entry
        // before the handle is stored.
        let slot = bucket.releases.entry(id);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(period).await;
            if let Some(bucket) = weak.upgrade() {
                bucket.release(id);
            }
        });
        slot.insert(handle);
    }

    fn release(&self, id: u64) {
        if self.releases.remove(&id).is_none() || self.closed.load(Ordering::Acquire) {
            return;
        }

        let remaining = self.remaining.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(grant = id, remaining, "Token released");
        self.available.notify_waiters();
    }

    fn abort_releases(&self) -> usize {
        let mut aborted = 0;
        self.releases.retain(|_, handle| {
            handle.abort();
            aborted += 1;
            false
        });
        aborted
    }
}

impl Drop for Bucket {
    fn drop(&mut self) {
        self.abort_releases();
    }
}
