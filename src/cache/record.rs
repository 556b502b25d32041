//! Cache Record Module
//!
//! Defines the per-hostname record held in the TTL store.

use serde::{Deserialize, Serialize};

use crate::cache::entry::{current_timestamp_ms, Entry};

// == Cache Record ==
/// One hostname's cached resolution result.
///
/// A record with an empty entry list is a *negative* record: the hostname was
/// queried and yielded nothing. It is distinct from an absent key ("not yet
/// queried") and carries its own short-lived expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Resolved entries; empty for a negative record
    pub entries: Vec<Entry>,
    /// Expiration timestamp of the whole record (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheRecord {
    // == Constructor ==
    /// Creates a record expiring `ttl_ms` milliseconds from now.
    ///
    /// `ttl_ms == 0` is legal and means "already expired".
    pub fn new(entries: Vec<Entry>, ttl_ms: u64) -> Self {
        Self {
            entries,
            expires_at: current_timestamp_ms().saturating_add(ttl_ms),
        }
    }

    // == Is Negative ==
    /// True if this record represents a cached not-found result.
    pub fn is_negative(&self) -> bool {
        self.entries.is_empty()
    }

    // == Is Expired ==
    /// Checks whether the record has expired at the given timestamp.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}
