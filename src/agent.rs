//! Agent Installation Module
//!
//! Glue for attaching the caching resolver to an HTTP-agent-like object. An
//! agent exposes a swappable connection factory; installing wraps that
//! factory in a decorator that injects this resolver's `lookup` into connect
//! options that did not specify one. Ownership is enforced with an opaque
//! owner token so only the installing resolver instance can uninstall.

use std::any::Any;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::cache::Entry;
use crate::error::{ResolveError, Result};
use crate::shaper::LookupOptions;

// == Lookup Contract ==
/// A resolution function suitable for use by connection factories.
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Resolves a hostname to a single shaped entry.
    async fn lookup(&self, hostname: &str, options: LookupOptions) -> Result<Entry>;
}

// == Connect Options ==
/// Parameters handed to a connection factory.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Hostname to connect to
    pub hostname: String,
    /// Destination port
    pub port: u16,
    /// Shaping policy for the resolution
    pub options: LookupOptions,
    /// Resolution function; when absent, an installed resolver fills it in
    pub lookup: Option<Arc<dyn Lookup>>,
}

impl ConnectOptions {
    /// Options for a plain hostname/port connection.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            options: LookupOptions::default(),
            lookup: None,
        }
    }
}

// == Connection Factory ==
/// Creates outbound connections for an agent.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a connection according to the given options.
    async fn connect(&self, options: ConnectOptions) -> io::Result<TcpStream>;

    /// Supports downcasting for install/uninstall bookkeeping.
    fn as_any(&self) -> &dyn Any;
}

// == Agent Contract ==
/// An object owning a swappable connection factory.
pub trait Agent {
    /// The current connection factory.
    fn connector(&self) -> Arc<dyn Connector>;

    /// Replaces the connection factory.
    fn set_connector(&mut self, connector: Arc<dyn Connector>);
}

// == Basic Agent ==
/// Minimal `Agent` holding nothing but its connection factory.
pub struct BasicAgent {
    connector: Arc<dyn Connector>,
}

impl BasicAgent {
    /// Creates an agent with the default direct-connect factory.
    pub fn new() -> Self {
        Self {
            connector: Arc::new(DefaultConnector),
        }
    }
}

impl Default for BasicAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent for BasicAgent {
    fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    fn set_connector(&mut self, connector: Arc<dyn Connector>) {
        self.connector = connector;
    }
}

// == Default Connector ==
/// Direct TCP connector: resolves through the options' lookup function when
/// one is present, otherwise defers to the operating system.
pub struct DefaultConnector;

#[async_trait]
impl Connector for DefaultConnector {
    async fn connect(&self, options: ConnectOptions) -> io::Result<TcpStream> {
        match &options.lookup {
            Some(lookup) => {
                let entry = lookup
                    .lookup(&options.hostname, options.options)
                    .await
                    .map_err(|error| {
                        let kind = if error.is_not_found() {
                            io::ErrorKind::NotFound
                        } else {
                            io::ErrorKind::Other
                        };
                        io::Error::new(kind, error)
                    })?;
                TcpStream::connect((entry.address, options.port)).await
            }
            None => TcpStream::connect((options.hostname.as_str(), options.port)).await,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// == Installed Connector ==
/// Decorator placed around an agent's original factory by `install`. Owns
/// the original so `uninstall` can restore it.
pub(crate) struct InstalledConnector {
    inner: Arc<dyn Connector>,
    resolver: Arc<dyn Lookup>,
    owner: u64,
}

#[async_trait]
impl Connector for InstalledConnector {
    async fn connect(&self, mut options: ConnectOptions) -> io::Result<TcpStream> {
        if options.lookup.is_none() {
            options.lookup = Some(Arc::clone(&self.resolver));
        }

        self.inner.connect(options).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Wraps the agent's factory so new connections default to `resolver`.
///
/// Fails with `AlreadyInstalled` if any resolver is already installed.
pub(crate) fn install(agent: &mut dyn Agent, resolver: Arc<dyn Lookup>, owner: u64) -> Result<()> {
    let current = agent.connector();

    if current.as_any().is::<InstalledConnector>() {
        return Err(ResolveError::AlreadyInstalled);
    }

    debug!(owner, "installing resolver on agent");
    agent.set_connector(Arc::new(InstalledConnector {
        inner: current,
        resolver,
        owner,
    }));

    Ok(())
}

/// Restores the agent's original factory.
///
/// A no-op when nothing is installed; fails with `NotOwned` when the
/// installed decorator belongs to a different resolver instance.
pub(crate) fn uninstall(agent: &mut dyn Agent, owner: u64) -> Result<()> {
    let current = agent.connector();

    if let Some(installed) = current.as_any().downcast_ref::<InstalledConnector>() {
        if installed.owner != owner {
            return Err(ResolveError::NotOwned);
        }

        debug!(owner, "uninstalling resolver from agent");
        agent.set_connector(Arc::clone(&installed.inner));
    }

    Ok(())
}
