//! Cacheable DNS - a caching hostname resolver
//!
//! Caches hostname-to-address resolution with TTL-driven expiry, deduplicates
//! concurrent lookups, and races an authoritative DNS query against the
//! system resolver for resilience.

pub mod agent;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod inflight;
pub mod resolver;
pub mod shaper;
pub mod sources;
pub mod tasks;

pub use agent::{Agent, BasicAgent, ConnectOptions, Connector, DefaultConnector, Lookup};
pub use cache::{AddressFamily, CacheRecord, CacheStorage, Entry, InMemoryStore, StatsSnapshot};
pub use config::Config;
pub use engine::{CachedResolver, CachedResolverBuilder};
pub use error::{ResolveError, Result};
pub use resolver::{DnsSource, FallbackSource, HickoryDns, RawRecord, SystemLookup};
pub use shaper::{LookupHints, LookupOptions};
pub use sources::{AssumeAll, HostsOverride, IfaceInfo, InterfaceProvider, StaticHosts};
