//! Resolved Entry Module
//!
//! Defines the structure for individual resolved address entries with TTL support.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Address Family ==
/// IP address family of a resolved entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl AddressFamily {
    /// Numeric form of the family (4 or 6), as exposed to callers.
    pub fn as_number(self) -> u8 {
        match self {
            AddressFamily::V4 => 4,
            AddressFamily::V6 => 6,
        }
    }
}

// == Resolved Entry ==
/// Represents a single resolved address with TTL metadata.
///
/// Entries are immutable once produced; the engine hands out clones so caller
/// mutation cannot corrupt cached state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// The resolved address
    pub address: IpAddr,
    /// Original TTL in seconds
    pub ttl: u64,
    /// Expiration timestamp (Unix milliseconds); `u64::MAX` for
    /// statically-configured entries that never expire
    pub expires: u64,
}

impl Entry {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` seconds from now.
    pub fn new(address: IpAddr, ttl: u64) -> Self {
        Self {
            address,
            ttl,
            expires: current_timestamp_ms().saturating_add(ttl.saturating_mul(1000)),
        }
    }

    /// Creates a statically-configured entry that never expires
    /// (e.g. from a hosts override).
    pub fn permanent(address: IpAddr) -> Self {
        Self {
            address,
            ttl: u64::MAX,
            expires: u64::MAX,
        }
    }

    // == Family ==
    /// Address family of this entry, derived from the address itself.
    pub fn family(&self) -> AddressFamily {
        match self.address {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration
    /// timestamp.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires
    }

    // == V4-Mapped Synthesis ==
    /// Re-derives this entry as an IPv4-mapped IPv6 entry.
    ///
    /// Only meaningful for family-4 entries; family-6 entries are returned
    /// unchanged.
    pub fn to_v4_mapped(&self) -> Self {
        match self.address {
            IpAddr::V4(v4) => Self {
                address: IpAddr::V6(v4.to_ipv6_mapped()),
                ttl: self.ttl,
                expires: self.expires,
            },
            IpAddr::V6(_) => self.clone(),
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
