//! Resolution Sources Module
//!
//! Trait seams for the two resolution paths raced by the engine: the
//! authoritative path (explicit A/AAAA queries with TTL metadata) and the
//! system fallback path (generic name resolution, no TTL metadata).

mod dns;
mod system;

use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;

pub use dns::HickoryDns;
pub use system::SystemLookup;

// == Raw Record ==
/// One address record as returned by the authoritative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// The resolved address
    pub address: IpAddr,
    /// Record TTL in seconds
    pub ttl: u64,
}

// == Authoritative Source ==
/// The configured-resolver path: explicit per-family queries carrying TTLs.
///
/// A definitive "no records" answer is `Ok` with an empty vector; `Err` is
/// reserved for transport-level failures.
#[async_trait]
pub trait DnsSource: Send + Sync {
    /// Queries A records for a hostname.
    async fn resolve4(&self, hostname: &str) -> io::Result<Vec<RawRecord>>;

    /// Queries AAAA records for a hostname.
    async fn resolve6(&self, hostname: &str) -> io::Result<Vec<RawRecord>>;

    /// Replaces the server list used for subsequent queries.
    async fn set_servers(&self, servers: Vec<SocketAddr>);

    /// Returns the currently configured server list.
    async fn servers(&self) -> Vec<SocketAddr>;
}

// == Fallback Source ==
/// The system-level path: all families at once, no TTL metadata.
#[async_trait]
pub trait FallbackSource: Send + Sync {
    /// Resolves a hostname through the operating system's resolver.
    async fn lookup_all(&self, hostname: &str) -> io::Result<Vec<IpAddr>>;
}
