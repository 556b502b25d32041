//! TTL Store Module
//!
//! The hostname-to-record store consulted by the cache engine. The store is
//! modelled as an injected capability so in-memory and external backends can
//! be swapped without touching the engine.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::entry::{current_timestamp_ms, Entry};
use crate::cache::record::CacheRecord;

// == Storage Contract ==
/// TTL-aware storage for cache records.
///
/// Implementations must never let a caller observe an expired record: `get`
/// on an expired key behaves as absent, whether the key is proactively
/// evicted or filtered at read time.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Returns the unexpired record for a hostname, if any.
    async fn get(&self, hostname: &str) -> Option<CacheRecord>;

    /// Stores a record for a hostname, replacing any previous one.
    ///
    /// `ttl_ms == 0` is legal and means "already expired".
    async fn set(&self, hostname: &str, entries: Vec<Entry>, ttl_ms: u64);

    /// Removes a hostname's record. Returns true if one was present.
    async fn delete(&self, hostname: &str) -> bool;

    /// Removes all records.
    async fn clear(&self);

    /// Earliest `expires_at` among stored records, for the expiry scheduler.
    async fn earliest_expiry(&self) -> Option<u64>;

    /// Removes every record whose expiry has passed at `now_ms`.
    ///
    /// Returns the number of records removed. This is the forced-eviction
    /// operation backing `tick()`.
    async fn sweep(&self, now_ms: u64) -> usize;

    /// Current number of stored records (expired ones included until swept).
    async fn len(&self) -> usize;
}

// == In-Memory Store ==
/// Default `CacheStorage` backend over a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, CacheRecord>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for InMemoryStore {
    async fn get(&self, hostname: &str) -> Option<CacheRecord> {
        let now = current_timestamp_ms();

        {
            let records = self.records.read().await;
            match records.get(hostname) {
                Some(record) if !record.is_expired_at(now) => return Some(record.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // The record was expired; evict it under a write lock. Re-check in
        // case a newer record landed between the two lock acquisitions.
        let mut records = self.records.write().await;
        match records.get(hostname) {
            Some(record) if !record.is_expired_at(now) => Some(record.clone()),
            Some(_) => {
                records.remove(hostname);
                debug!(hostname, "evicted expired record on read");
                None
            }
            None => None,
        }
    }

    async fn set(&self, hostname: &str, entries: Vec<Entry>, ttl_ms: u64) {
        let record = CacheRecord::new(entries, ttl_ms);
        debug!(
            hostname,
            ttl_ms,
            negative = record.is_negative(),
            "stored record"
        );
        self.records.write().await.insert(hostname.to_string(), record);
    }

    async fn delete(&self, hostname: &str) -> bool {
        self.records.write().await.remove(hostname).is_some()
    }

    async fn clear(&self) {
        self.records.write().await.clear();
    }

    async fn earliest_expiry(&self) -> Option<u64> {
        self.records
            .read()
            .await
            .values()
            .map(|record| record.expires_at)
            .min()
    }

    async fn sweep(&self, now_ms: u64) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now_ms));
        let removed = before - records.len();

        if removed > 0 {
            debug!(removed, "swept expired records");
        }

        removed
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::time::Duration;

    fn entry(address: &str, ttl: u64) -> Entry {
        Entry::new(address.parse::<IpAddr>().unwrap(), ttl)
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = InMemoryStore::new();

        store.set("example.com", vec![entry("1.2.3.4", 60)], 60_000).await;

        let record = store.get("example.com").await.unwrap();
        assert_eq!(record.entries.len(), 1);
        assert_eq!(record.entries[0].address.to_string(), "1.2.3.4");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_get_absent() {
        let store = InMemoryStore::new();
        assert!(store.get("nonexistent.invalid").await.is_none());
    }

    #[tokio::test]
    async fn test_store_expired_key_behaves_as_absent() {
        let store = InMemoryStore::new();

        store.set("example.com", vec![entry("1.2.3.4", 0)], 0).await;

        assert!(store.get("example.com").await.is_none());
        // Read-time eviction removed the key entirely
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = InMemoryStore::new();

        store.set("example.com", vec![entry("1.2.3.4", 1)], 50).await;
        assert!(store.get("example.com").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get("example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_store_negative_record_is_a_hit() {
        let store = InMemoryStore::new();

        store.set("doesnotexist.invalid", Vec::new(), 60_000).await;

        let record = store.get("doesnotexist.invalid").await.unwrap();
        assert!(record.is_negative());
    }

    #[tokio::test]
    async fn test_store_delete() {
        let store = InMemoryStore::new();

        store.set("example.com", vec![entry("1.2.3.4", 60)], 60_000).await;
        assert!(store.delete("example.com").await);
        assert!(!store.delete("example.com").await);
        assert!(store.get("example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_store_clear() {
        let store = InMemoryStore::new();

        store.set("a.com", vec![entry("1.2.3.4", 60)], 60_000).await;
        store.set("b.com", vec![entry("5.6.7.8", 60)], 60_000).await;
        store.clear().await;

        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_store_displacement_replaces_record() {
        let store = InMemoryStore::new();

        store.set("example.com", vec![entry("1.2.3.4", 60)], 60_000).await;
        store.set("example.com", vec![entry("5.6.7.8", 60)], 60_000).await;

        let record = store.get("example.com").await.unwrap();
        assert_eq!(record.entries.len(), 1);
        assert_eq!(record.entries[0].address.to_string(), "5.6.7.8");
    }

    #[tokio::test]
    async fn test_store_earliest_expiry() {
        let store = InMemoryStore::new();
        assert_eq!(store.earliest_expiry().await, None);

        store.set("slow.com", vec![entry("1.2.3.4", 60)], 60_000).await;
        store.set("fast.com", vec![entry("5.6.7.8", 1)], 1_000).await;

        let earliest = store.earliest_expiry().await.unwrap();
        let fast = store.get("fast.com").await.unwrap();
        assert_eq!(earliest, fast.expires_at);
    }

    #[tokio::test]
    async fn test_store_sweep() {
        let store = InMemoryStore::new();

        store.set("gone.com", vec![entry("1.2.3.4", 0)], 0).await;
        store.set("kept.com", vec![entry("5.6.7.8", 60)], 60_000).await;

        let removed = store.sweep(current_timestamp_ms()).await;
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("kept.com").await.is_some());
    }
}
