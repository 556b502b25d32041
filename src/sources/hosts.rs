//! Hosts Override Source
//!
//! A prioritized override consulted before the TTL store and the network.
//! Answers coming from here are authoritative and never expire.

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::Entry;

// == Hosts Override Contract ==
/// Static hostname overrides, e.g. backed by a watched hosts file.
///
/// Returned entries must carry infinite ttl/expires. I/O failures (an
/// unreadable backing file) surface to the engine's caller as-is.
#[async_trait]
pub trait HostsOverride: Send + Sync {
    /// Returns the override entries for a hostname, if any.
    async fn get(&self, hostname: &str) -> io::Result<Option<Vec<Entry>>>;
}

// == Static Hosts ==
/// In-memory `HostsOverride` backend.
#[derive(Debug, Default)]
pub struct StaticHosts {
    entries: RwLock<HashMap<String, Vec<IpAddr>>>,
}

impl StaticHosts {
    /// Creates an empty override table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an address for a hostname.
    pub async fn add(&self, hostname: impl Into<String>, address: IpAddr) {
        self.entries
            .write()
            .await
            .entry(hostname.into())
            .or_default()
            .push(address);
    }

    /// Removes all overrides for a hostname.
    pub async fn remove(&self, hostname: &str) {
        self.entries.write().await.remove(hostname);
    }
}

#[async_trait]
impl HostsOverride for StaticHosts {
    async fn get(&self, hostname: &str) -> io::Result<Option<Vec<Entry>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(hostname).map(|addresses| {
            addresses
                .iter()
                .map(|address| Entry::permanent(*address))
                .collect()
        }))
    }
}
