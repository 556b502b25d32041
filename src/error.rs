//! Error types for the caching resolver
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Resolve Error Enum ==
/// Unified error type for the caching resolver.
///
/// The enum is `Clone` so a single resolution outcome can be broadcast to
/// every caller waiting on the same in-flight ticket; the underlying
/// `std::io::Error` is wrapped in an `Arc` for that reason.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// No entries were found for the hostname from any source
    #[error("hostname not found: {hostname}")]
    NotFound {
        /// The hostname that failed to resolve
        hostname: String,
    },

    /// An underlying I/O failure (e.g. an unreadable hosts source)
    #[error("lookup I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// The resolver has already been installed on this agent
    #[error("resolver is already installed on this agent")]
    AlreadyInstalled,

    /// The agent's connector was installed by a different resolver instance
    #[error("agent is not owned by this resolver instance")]
    NotOwned,
}

impl ResolveError {
    /// Builds a not-found error for the given hostname.
    pub fn not_found(hostname: impl Into<String>) -> Self {
        ResolveError::NotFound {
            hostname: hostname.into(),
        }
    }

    /// Returns true if this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(error: std::io::Error) -> Self {
        ResolveError::Io(Arc::new(error))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching resolver.
pub type Result<T> = std::result::Result<T, ResolveError>;
