//! Expiry Scheduler Task
//!
//! Background task that evicts expired records from the TTL store. A single
//! timer is re-armed to fire at the earliest known expiry rather than one
//! timer per key, so timer churn stays O(1) regardless of cache size.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::cache::{current_timestamp_ms, CacheStorage, ResolverStats};

// == Expiry Scheduler ==
/// Owns the eviction timer for one cache engine.
///
/// Lifecycle is explicit: created by `start`, revoked by `stop` (or drop).
/// The engine pokes the scheduler after every store write so a new earliest
/// expiry can shorten the pending sleep.
#[derive(Debug)]
pub struct ExpiryScheduler {
    handle: JoinHandle<()>,
    notify: Arc<Notify>,
}

impl ExpiryScheduler {
    /// Spawns the scheduler task.
    ///
    /// `min_interval` is the lock window: after a sweep the scheduler will
    /// not scan again for at least this long, bounding re-arm thrash when
    /// TTLs are sub-second at the cost of a bounded staleness window.
    pub fn start(
        store: Arc<dyn CacheStorage>,
        stats: Arc<ResolverStats>,
        min_interval: Duration,
    ) -> Self {
        let notify = Arc::new(Notify::new());
        let task_notify = Arc::clone(&notify);

        let handle = tokio::spawn(async move {
            info!(?min_interval, "expiry scheduler started");

            loop {
                match store.earliest_expiry().await {
                    // Nothing cached: park until the next set
                    None => task_notify.notified().await,
                    Some(expires_at) => {
                        let now = current_timestamp_ms();

                        if expires_at > now {
                            let wait = Duration::from_millis(expires_at - now);
                            // A set may introduce an earlier expiry; wake up
                            // and recompute when poked
                            tokio::select! {
                                _ = sleep(wait) => {}
                                _ = task_notify.notified() => {}
                            }
                        } else {
                            let removed = store.sweep(now).await;
                            if removed > 0 {
                                stats.record_evictions(removed as u64);
                                debug!(removed, "expiry sweep");
                            }
                            sleep(min_interval).await;
                        }
                    }
                }
            }
        });

        Self { handle, notify }
    }

    /// Wakes the scheduler so it recomputes the earliest expiry.
    pub fn poke(&self) {
        self.notify.notify_one();
    }

    /// Revokes the scheduler's timer.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
