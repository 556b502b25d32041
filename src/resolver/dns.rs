//! Authoritative DNS Source
//!
//! Implements the authoritative resolution path on top of hickory-resolver,
//! issuing explicit A and AAAA queries so per-record TTLs are available to
//! the cache.

use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError as DnsError, ResolveErrorKind};
use hickory_resolver::proto::rr::RData;
use hickory_resolver::TokioAsyncResolver;
use tokio::sync::RwLock;
use tracing::debug;

use crate::resolver::{DnsSource, RawRecord};

// == Hickory DNS Source ==
/// `DnsSource` backed by a hickory `TokioAsyncResolver`.
///
/// hickory resolvers are immutable once built, so `set_servers` rebuilds the
/// inner resolver from the new list. The handle is cloned out of the lock
/// before each query; a rebuild never blocks in-flight lookups.
pub struct HickoryDns {
    resolver: RwLock<TokioAsyncResolver>,
    servers: RwLock<Vec<SocketAddr>>,
}

impl HickoryDns {
    /// Creates a source using the system resolver configuration
    /// (e.g. `/etc/resolv.conf`), falling back to the library default when
    /// no system configuration can be read.
    pub fn from_system_conf() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .unwrap_or_else(|_| {
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            });

        Self {
            resolver: RwLock::new(resolver),
            servers: RwLock::new(Vec::new()),
        }
    }

    fn build(servers: &[SocketAddr]) -> TokioAsyncResolver {
        let mut config = ResolverConfig::new();
        for server in servers {
            config.add_name_server(NameServerConfig::new(*server, Protocol::Udp));
        }

        TokioAsyncResolver::tokio(config, ResolverOpts::default())
    }
}

impl Default for HickoryDns {
    fn default() -> Self {
        Self::from_system_conf()
    }
}

/// Maps a hickory error to the source contract: a definitive "no records"
/// answer becomes an empty record list, everything else an I/O error.
fn map_lookup_error(error: DnsError) -> io::Result<Vec<RawRecord>> {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
        _ => Err(io::Error::new(io::ErrorKind::Other, error)),
    }
}

#[async_trait]
impl DnsSource for HickoryDns {
    async fn resolve4(&self, hostname: &str) -> io::Result<Vec<RawRecord>> {
        let resolver = self.resolver.read().await.clone();

        match resolver.ipv4_lookup(hostname).await {
            Ok(lookup) => Ok(lookup
                .as_lookup()
                .record_iter()
                .filter_map(|record| match record.data() {
                    Some(RData::A(a)) => Some(RawRecord {
                        address: IpAddr::V4(a.0),
                        ttl: u64::from(record.ttl()),
                    }),
                    _ => None,
                })
                .collect()),
            Err(error) => map_lookup_error(error),
        }
    }

    async fn resolve6(&self, hostname: &str) -> io::Result<Vec<RawRecord>> {
        let resolver = self.resolver.read().await.clone();

        match resolver.ipv6_lookup(hostname).await {
            Ok(lookup) => Ok(lookup
                .as_lookup()
                .record_iter()
                .filter_map(|record| match record.data() {
                    Some(RData::AAAA(aaaa)) => Some(RawRecord {
                        address: IpAddr::V6(aaaa.0),
                        ttl: u64::from(record.ttl()),
                    }),
                    _ => None,
                })
                .collect()),
            Err(error) => map_lookup_error(error),
        }
    }

    async fn set_servers(&self, servers: Vec<SocketAddr>) {
        debug!(?servers, "rebuilding resolver with new server list");

        let rebuilt = Self::build(&servers);
        *self.resolver.write().await = rebuilt;
        *self.servers.write().await = servers;
    }

    async fn servers(&self) -> Vec<SocketAddr> {
        self.servers.read().await.clone()
    }
}
