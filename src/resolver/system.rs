//! System Fallback Source
//!
//! Implements the fallback resolution path through the operating system's
//! own name resolution (getaddrinfo), which knows about locally-configured
//! names but carries no TTL metadata.

use std::io;
use std::net::IpAddr;

use async_trait::async_trait;

use crate::resolver::FallbackSource;

// == System Lookup ==
/// `FallbackSource` backed by `tokio::net::lookup_host`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLookup;

#[async_trait]
impl FallbackSource for SystemLookup {
    async fn lookup_all(&self, hostname: &str) -> io::Result<Vec<IpAddr>> {
        // Port 0 is only there to satisfy the ToSocketAddrs contract
        let addresses = tokio::net::lookup_host((hostname, 0)).await?;
        Ok(addresses.map(|socket_addr| socket_addr.ip()).collect())
    }
}
