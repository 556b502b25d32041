//! Cache Engine Module
//!
//! The orchestrator behind the public query contract: hosts override first,
//! then the TTL store, then a deduplicated dual-source resolution that races
//! the authoritative path against the system fallback.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::{self, Agent, Lookup};
use crate::cache::{
    current_timestamp_ms, CacheStorage, Entry, InMemoryStore, ResolverStats, StatsSnapshot,
};
use crate::config::Config;
use crate::error::{ResolveError, Result};
use crate::inflight::InFlight;
use crate::resolver::{DnsSource, FallbackSource, HickoryDns, SystemLookup};
use crate::shaper::{self, LookupOptions};
use crate::sources::{AssumeAll, HostsOverride, IfaceInfo, InterfaceProvider};
use crate::tasks::ExpiryScheduler;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

// == Cached Resolver ==
/// A caching hostname resolver.
///
/// Cheap to clone; clones share the same cache, deduplicator and scheduler.
#[derive(Clone)]
pub struct CachedResolver {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    config: Config,
    store: Arc<dyn CacheStorage>,
    dns: Arc<dyn DnsSource>,
    fallback: Arc<dyn FallbackSource>,
    hosts: Option<Arc<dyn HostsOverride>>,
    iface_provider: Arc<dyn InterfaceProvider>,
    iface: RwLock<IfaceInfo>,
    inflight: InFlight,
    /// hostname -> timestamp (ms) until which the authoritative path is skipped
    fallback_preferred: Mutex<HashMap<String, u64>>,
    rng: Mutex<fastrand::Rng>,
    stats: Arc<ResolverStats>,
    scheduler: ExpiryScheduler,
}

// == Builder ==
/// Builds a `CachedResolver`, with defaults for every collaborator.
#[derive(Default)]
pub struct CachedResolverBuilder {
    config: Option<Config>,
    store: Option<Arc<dyn CacheStorage>>,
    dns: Option<Arc<dyn DnsSource>>,
    fallback: Option<Arc<dyn FallbackSource>>,
    hosts: Option<Arc<dyn HostsOverride>>,
    iface_provider: Option<Arc<dyn InterfaceProvider>>,
    rng_seed: Option<u64>,
}

impl CachedResolverBuilder {
    /// Sets the TTL/negative-cache configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Supplies an external TTL store. The engine treats it as possibly
    /// shared with other owners.
    pub fn store(mut self, store: Arc<dyn CacheStorage>) -> Self {
        self.store = Some(store);
        self
    }

    /// Supplies the authoritative DNS source.
    pub fn dns_source(mut self, dns: Arc<dyn DnsSource>) -> Self {
        self.dns = Some(dns);
        self
    }

    /// Supplies the system fallback source.
    pub fn fallback_source(mut self, fallback: Arc<dyn FallbackSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Supplies a hosts override consulted before everything else.
    pub fn hosts(mut self, hosts: Arc<dyn HostsOverride>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    /// Supplies the interface-availability provider.
    pub fn interface_provider(mut self, provider: Arc<dyn InterfaceProvider>) -> Self {
        self.iface_provider = Some(provider);
        self
    }

    /// Seeds the entry-selection rng for reproducible tests.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Builds the resolver and starts its expiry scheduler.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> CachedResolver {
        let config = self.config.unwrap_or_default();
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()) as Arc<dyn CacheStorage>);
        let stats = Arc::new(ResolverStats::new());
        let iface_provider = self
            .iface_provider
            .unwrap_or_else(|| Arc::new(AssumeAll) as Arc<dyn InterfaceProvider>);
        let iface = iface_provider.interfaces();

        let scheduler =
            ExpiryScheduler::start(Arc::clone(&store), Arc::clone(&stats), config.lock_time());

        let rng = match self.rng_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        info!(id, "caching resolver created");

        CachedResolver {
            inner: Arc::new(Inner {
                id,
                config,
                store,
                dns: self
                    .dns
                    .unwrap_or_else(|| Arc::new(HickoryDns::from_system_conf()) as Arc<dyn DnsSource>),
                fallback: self
                    .fallback
                    .unwrap_or_else(|| Arc::new(SystemLookup) as Arc<dyn FallbackSource>),
                hosts: self.hosts,
                iface_provider,
                iface: RwLock::new(iface),
                inflight: InFlight::new(),
                fallback_preferred: Mutex::new(HashMap::new()),
                rng: Mutex::new(rng),
                stats,
                scheduler,
            }),
        }
    }
}

impl CachedResolver {
    /// Starts building a resolver.
    pub fn builder() -> CachedResolverBuilder {
        CachedResolverBuilder::default()
    }

    /// Builds a resolver with all defaults.
    pub fn new() -> Self {
        Self::builder().build()
    }

    // == Query ==
    /// Returns the raw (post-cache, pre-shaping) entries for a hostname.
    ///
    /// Order of resolution: hosts override, TTL store, then a deduplicated
    /// dual-source resolution. Returned entries are always copies of cached
    /// state. A negative cache hit yields an empty list; a fresh resolution
    /// where both paths fail yields `NotFound`.
    pub async fn query(&self, hostname: &str) -> Result<Vec<Entry>> {
        if let Some(hosts) = &self.inner.hosts {
            if let Some(entries) = hosts.get(hostname).await? {
                debug!(hostname, "hosts override hit");
                self.inner.stats.record_hit();
                return Ok(entries);
            }
        }

        if let Some(record) = self.inner.store.get(hostname).await {
            debug!(hostname, negative = record.is_negative(), "cache hit");
            self.inner.stats.record_hit();
            return Ok(record.entries);
        }

        self.inner.stats.record_miss();
        let inner = Arc::clone(&self.inner);
        let owned = hostname.to_string();
        self.inner
            .inflight
            .run(hostname, async move { Inner::query_and_cache(inner, owned).await })
            .await
    }

    // == Lookup ==
    /// Resolves a hostname to a single shaped entry.
    ///
    /// With multiple candidates an unweighted uniform random choice spreads
    /// load across them.
    pub async fn lookup(&self, hostname: &str, options: LookupOptions) -> Result<Entry> {
        let shaped = self.lookup_all(hostname, options).await?;
        let mut rng = self.inner.rng.lock().expect("rng lock poisoned");
        shaper::pick(&shaped, &mut rng)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(hostname))
    }

    /// Resolves a hostname to the full shaped entry list, in the order
    /// produced by the resolution path.
    pub async fn lookup_all(&self, hostname: &str, options: LookupOptions) -> Result<Vec<Entry>> {
        let entries = self.query(hostname).await?;
        let iface = *self.inner.iface.read().expect("iface lock poisoned");
        let shaped = shaper::shape(entries, &options, iface);

        if shaped.is_empty() {
            return Err(ResolveError::not_found(hostname));
        }

        Ok(shaped)
    }

    // == Cache Maintenance ==
    /// Clears one hostname's record, or the whole store.
    pub async fn clear(&self, hostname: Option<&str>) {
        match hostname {
            Some(hostname) => {
                self.inner.store.delete(hostname).await;
            }
            None => self.inner.store.clear().await,
        }
    }

    /// Forces a synchronous eviction sweep. Returns the number of records
    /// removed.
    pub async fn tick(&self) -> usize {
        let removed = self.inner.store.sweep(current_timestamp_ms()).await;
        self.inner.stats.record_evictions(removed as u64);
        removed
    }

    // == Server Management ==
    /// Replaces the authoritative resolver's server list.
    ///
    /// Also refreshes interface info: a server change usually accompanies a
    /// network change.
    pub async fn set_servers(&self, servers: Vec<std::net::SocketAddr>) {
        self.update_interface_info().await;
        self.inner.dns.set_servers(servers).await;
    }

    /// Returns the authoritative resolver's server list.
    pub async fn servers(&self) -> Vec<std::net::SocketAddr> {
        self.inner.dns.servers().await
    }

    // == Interface Info ==
    /// Re-fetches interface availability after a network change and clears
    /// the store, since shaping decisions may no longer hold.
    pub async fn update_interface_info(&self) {
        let refreshed = self.inner.iface_provider.interfaces();
        *self.inner.iface.write().expect("iface lock poisoned") = refreshed;
        self.inner.store.clear().await;
        debug!(?refreshed, "interface info refreshed");
    }

    // == Stats ==
    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    // == Agent Installation ==
    /// Injects this resolver's `lookup` as the default resolution function
    /// for the agent's new connections.
    pub fn install(&self, agent: &mut dyn Agent) -> Result<()> {
        agent::install(agent, Arc::new(self.clone()), self.inner.id)
    }

    /// Restores the agent's original connection factory. Only the installing
    /// resolver instance may uninstall.
    pub fn uninstall(&self, agent: &mut dyn Agent) -> Result<()> {
        agent::uninstall(agent, self.inner.id)
    }

    // == Shutdown ==
    /// Revokes the expiry scheduler's timer.
    pub fn shutdown(&self) {
        self.inner.scheduler.stop();
    }
}

impl Default for CachedResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lookup for CachedResolver {
    async fn lookup(&self, hostname: &str, options: LookupOptions) -> Result<Entry> {
        CachedResolver::lookup(self, hostname, options).await
    }
}

// == Dual-Source Resolution ==
impl Inner {
    /// Resolves a hostname through both paths, commits the result to the
    /// store and returns the entries handed to the caller.
    async fn query_and_cache(inner: Arc<Inner>, hostname: String) -> Result<Vec<Entry>> {
        if inner.fallback_only(&hostname) {
            debug!(hostname, "fallback-preferred, skipping authoritative path");
            return match inner.fallback_entries(&hostname).await {
                Ok(entries) if !entries.is_empty() => {
                    inner
                        .write_through(&hostname, &entries, inner.config.fallback_ttl.saturating_mul(1000))
                        .await;
                    Ok(entries)
                }
                _ => inner.resolution_failed(&hostname).await,
            };
        }

        let mut authoritative = spawn_authoritative(&inner, &hostname);
        let mut fallback = spawn_fallback(&inner, &hostname);

        tokio::select! {
            won = &mut authoritative => {
                Inner::authoritative_won(&inner, &hostname, flatten(won), fallback).await
            }
            won = &mut fallback => {
                Inner::fallback_won(&inner, &hostname, flatten(won), authoritative).await
            }
        }
    }

    /// Handles the fallback path settling first.
    async fn fallback_won(
        inner: &Arc<Inner>,
        hostname: &str,
        won: io::Result<Vec<Entry>>,
        authoritative: JoinHandle<io::Result<(Vec<Entry>, u64)>>,
    ) -> Result<Vec<Entry>> {
        match won {
            Ok(entries) if !entries.is_empty() => {
                inner
                    .write_through(hostname, &entries, inner.config.fallback_ttl.saturating_mul(1000))
                    .await;
                Inner::spawn_reconcile(inner, hostname, authoritative);
                Ok(entries)
            }
            // The fallback lost on content; the authoritative path may still
            // deliver, so wait for it in the foreground
            _ => match flatten(authoritative.await) {
                Ok((entries, observed_ttl)) if !entries.is_empty() => {
                    inner.commit_authoritative(hostname, &entries, observed_ttl).await;
                    Ok(entries)
                }
                _ => inner.resolution_failed(hostname).await,
            },
        }
    }

    /// Handles the authoritative path settling first.
    async fn authoritative_won(
        inner: &Arc<Inner>,
        hostname: &str,
        won: io::Result<(Vec<Entry>, u64)>,
        fallback: JoinHandle<io::Result<Vec<Entry>>>,
    ) -> Result<Vec<Entry>> {
        match won {
            Ok((entries, observed_ttl)) if !entries.is_empty() => {
                // The slower fallback result is discarded
                fallback.abort();
                inner.commit_authoritative(hostname, &entries, observed_ttl).await;
                Ok(entries)
            }
            // Zero entries without an error, or a failed path: the fallback
            // may know about hosts the authoritative resolver does not
            outcome => {
                if outcome.is_err() {
                    inner.mark_fallback_preferred(hostname);
                }

                match flatten(fallback.await) {
                    Ok(entries) if !entries.is_empty() => {
                        // An empty authoritative answer that the fallback
                        // contradicts demotes the path as well
                        if outcome.is_ok() {
                            inner.mark_fallback_preferred(hostname);
                        }
                        inner
                            .write_through(hostname, &entries, inner.config.fallback_ttl.saturating_mul(1000))
                            .await;
                        Ok(entries)
                    }
                    _ => inner.resolution_failed(hostname).await,
                }
            }
        }
    }

    /// Awaits the slower authoritative path detached from the caller.
    ///
    /// Its failures are logged and swallowed; they must never surface to, or
    /// block, the original caller.
    fn spawn_reconcile(
        inner: &Arc<Inner>,
        hostname: &str,
        authoritative: JoinHandle<io::Result<(Vec<Entry>, u64)>>,
    ) {
        let inner = Arc::clone(inner);
        let hostname = hostname.to_string();

        tokio::spawn(async move {
            match flatten(authoritative.await) {
                Ok((entries, observed_ttl)) if !entries.is_empty() => {
                    // The authoritative result carries real TTLs and is
                    // preferred for future hits
                    if inner.config.cap_ttl(observed_ttl) > 0 {
                        inner.commit_authoritative(&hostname, &entries, observed_ttl).await;
                    }
                }
                Ok(_) => {
                    debug!(hostname, "authoritative path empty, preferring fallback");
                    inner.mark_fallback_preferred(&hostname);
                }
                Err(error) => {
                    warn!(hostname, %error, "authoritative path failed in background");
                    inner.mark_fallback_preferred(&hostname);
                }
            }
        });
    }

    /// Caches an empty negative record and reports not-found.
    async fn resolution_failed(&self, hostname: &str) -> Result<Vec<Entry>> {
        debug!(hostname, "no entries from either path, caching negative result");
        self.store
            .set(hostname, Vec::new(), self.config.error_ttl_ms)
            .await;
        self.scheduler.poke();
        Err(ResolveError::not_found(hostname))
    }

    /// Writes an authoritative result through the store under the max-TTL
    /// policy.
    async fn commit_authoritative(&self, hostname: &str, entries: &[Entry], observed_ttl: u64) {
        let cache_ttl_ms = self.config.cap_ttl(observed_ttl).saturating_mul(1000);
        self.write_through(hostname, entries, cache_ttl_ms).await;
    }

    async fn write_through(&self, hostname: &str, entries: &[Entry], cache_ttl_ms: u64) {
        if cache_ttl_ms == 0 {
            return;
        }

        self.store.set(hostname, entries.to_vec(), cache_ttl_ms).await;
        self.scheduler.poke();
    }

    /// Queries A and AAAA concurrently through the authoritative source.
    ///
    /// One family failing is tolerated; both failing is a path failure.
    /// Returns the entries (family 4 before family 6) and the maximum
    /// observed TTL.
    async fn authoritative_entries(&self, hostname: &str) -> io::Result<(Vec<Entry>, u64)> {
        let (a, aaaa) = tokio::join!(self.dns.resolve4(hostname), self.dns.resolve6(hostname));

        let (a, aaaa) = match (a, aaaa) {
            (Err(error), Err(_)) => return Err(error),
            (a, aaaa) => (a.unwrap_or_default(), aaaa.unwrap_or_default()),
        };

        let mut observed_ttl = 0;
        let mut entries = Vec::with_capacity(a.len() + aaaa.len());
        for record in a.into_iter().chain(aaaa) {
            observed_ttl = observed_ttl.max(record.ttl);
            entries.push(Entry::new(record.address, record.ttl));
        }

        Ok((entries, observed_ttl))
    }

    /// Queries the system fallback; entries get the configured fallback TTL.
    async fn fallback_entries(&self, hostname: &str) -> io::Result<Vec<Entry>> {
        let addresses = self.fallback.lookup_all(hostname).await?;
        Ok(addresses
            .into_iter()
            .map(|address| Entry::new(address, self.config.fallback_ttl))
            .collect())
    }

    // == Fallback Preference ==
    /// True while the hostname's fallback-preference window is open. An
    /// elapsed mark is cleared on the way out.
    fn fallback_only(&self, hostname: &str) -> bool {
        let now = current_timestamp_ms();
        let mut marks = self
            .fallback_preferred
            .lock()
            .expect("fallback lock poisoned");

        match marks.get(hostname) {
            Some(&until) if now < until => true,
            Some(_) => {
                marks.remove(hostname);
                false
            }
            None => false,
        }
    }

    fn mark_fallback_preferred(&self, hostname: &str) {
        let until = current_timestamp_ms().saturating_add(self.config.fallback_hold.saturating_mul(1000));
        self.fallback_preferred
            .lock()
            .expect("fallback lock poisoned")
            .insert(hostname.to_string(), until);
    }
}

fn spawn_authoritative(
    inner: &Arc<Inner>,
    hostname: &str,
) -> JoinHandle<io::Result<(Vec<Entry>, u64)>> {
    let inner = Arc::clone(inner);
    let hostname = hostname.to_string();
    tokio::spawn(async move { inner.authoritative_entries(&hostname).await })
}

fn spawn_fallback(inner: &Arc<Inner>, hostname: &str) -> JoinHandle<io::Result<Vec<Entry>>> {
    let inner = Arc::clone(inner);
    let hostname = hostname.to_string();
    tokio::spawn(async move { inner.fallback_entries(&hostname).await })
}

/// Collapses a join result into the task's own I/O result.
fn flatten<T>(joined: std::result::Result<io::Result<T>, tokio::task::JoinError>) -> io::Result<T> {
    match joined {
        Ok(result) => result,
        Err(join_error) => Err(io::Error::new(io::ErrorKind::Other, join_error)),
    }
}
