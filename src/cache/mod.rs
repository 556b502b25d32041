//! Cache Module
//!
//! Provides the TTL store, entry model and statistics used by the cache engine.

mod entry;
mod record;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, AddressFamily, Entry};
pub use record::CacheRecord;
pub use stats::{ResolverStats, StatsSnapshot};
pub use store::{CacheStorage, InMemoryStore};
