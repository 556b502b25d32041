//! Resolver Statistics Module
//!
//! Tracks cache performance metrics across concurrent callers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Resolver Stats ==
/// Cache performance counters.
///
/// Counters use relaxed atomics; they are observability data, not
/// synchronization points.
#[derive(Debug, Default)]
pub struct ResolverStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Queries answered from the store or hosts override
    pub hits: u64,
    /// Queries that had to go to the network
    pub misses: u64,
    /// Records removed by expiry sweeps
    pub evictions: u64,
}

impl ResolverStats {
    /// Creates a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cache hit.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cache miss.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` evictions.
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
