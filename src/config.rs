//! Configuration Module
//!
//! Handles loading and managing resolver configuration from environment variables.

use std::env;
use std::time::Duration;

/// Resolver configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound in seconds applied to TTLs observed from the authoritative
    /// path. `None` means no bound; `Some(0)` effectively disables caching.
    pub max_ttl: Option<u64>,
    /// TTL in seconds assigned to entries produced by the fallback path,
    /// which carries no TTL metadata of its own
    pub fallback_ttl: u64,
    /// TTL in milliseconds for cached negative (not-found) records
    pub error_ttl_ms: u64,
    /// How long in seconds a hostname stays marked fallback-preferred after
    /// the authoritative path failed for it
    pub fallback_hold: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_TTL` - Maximum cacheable TTL in seconds (default: unlimited)
    /// - `FALLBACK_TTL` - TTL in seconds for fallback-path entries (default: 1)
    /// - `ERROR_TTL_MS` - Negative-cache TTL in milliseconds (default: 150)
    /// - `FALLBACK_HOLD` - Fallback-preference window in seconds (default: 3600)
    pub fn from_env() -> Self {
        Self {
            max_ttl: env::var("MAX_TTL").ok().and_then(|v| v.parse().ok()),
            fallback_ttl: env::var("FALLBACK_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            error_ttl_ms: env::var("ERROR_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(150),
            fallback_hold: env::var("FALLBACK_HOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }

    /// Minimum interval between expiry sweeps.
    ///
    /// Tied to the shortest configured TTL class so that sub-second TTLs
    /// cannot re-arm the expiry timer more often than once per window.
    /// Never shorter than 10ms.
    pub fn lock_time(&self) -> Duration {
        let shortest = self.fallback_ttl.saturating_mul(1000).min(self.error_ttl_ms);
        Duration::from_millis(shortest.max(10))
    }

    /// Caps an observed TTL (in seconds) by the configured maximum.
    pub fn cap_ttl(&self, observed: u64) -> u64 {
        match self.max_ttl {
            Some(max) => observed.min(max),
            None => observed,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_ttl: None,
            fallback_ttl: 1,
            error_ttl_ms: 150,
            fallback_hold: 3600,
        }
    }
}
