//! Integration tests for the caching resolver engine
//!
//! Exercises the public contract end-to-end with mock resolution sources:
//! deduplication, TTL respect, race behavior, fallback preference, negative
//! caching, shaping and agent installation.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cacheable_dns::{
    AddressFamily, AssumeAll, BasicAgent, CachedResolver, Config, DnsSource, FallbackSource,
    HostsOverride, IfaceInfo, InterfaceProvider, LookupHints, LookupOptions, RawRecord,
    ResolveError, StaticHosts,
};

// == Mock Sources ==

/// Authoritative source with canned per-hostname answers, an optional delay
/// and a call counter.
#[derive(Default)]
struct MockDns {
    answers4: HashMap<String, Vec<RawRecord>>,
    answers6: HashMap<String, Vec<RawRecord>>,
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
    servers: Mutex<Vec<SocketAddr>>,
}

impl MockDns {
    fn new() -> Self {
        Self::default()
    }

    fn with_a(mut self, hostname: &str, address: &str, ttl: u64) -> Self {
        self.answers4
            .entry(hostname.to_string())
            .or_default()
            .push(RawRecord {
                address: address.parse().unwrap(),
                ttl,
            });
        self
    }

    fn with_aaaa(mut self, hostname: &str, address: &str, ttl: u64) -> Self {
        self.answers6
            .entry(hostname.to_string())
            .or_default()
            .push(RawRecord {
                address: address.parse().unwrap(),
                ttl,
            });
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Total resolve4 + resolve6 invocations; one full resolution makes two.
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        table: &HashMap<String, Vec<RawRecord>>,
        hostname: &str,
    ) -> io::Result<Vec<RawRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.fail {
            return Err(io::Error::new(io::ErrorKind::Other, "mock dns failure"));
        }

        Ok(table.get(hostname).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl DnsSource for MockDns {
    async fn resolve4(&self, hostname: &str) -> io::Result<Vec<RawRecord>> {
        self.answer(&self.answers4, hostname).await
    }

    async fn resolve6(&self, hostname: &str) -> io::Result<Vec<RawRecord>> {
        self.answer(&self.answers6, hostname).await
    }

    async fn set_servers(&self, servers: Vec<SocketAddr>) {
        *self.servers.lock().unwrap() = servers;
    }

    async fn servers(&self) -> Vec<SocketAddr> {
        self.servers.lock().unwrap().clone()
    }
}

/// Fallback source with canned answers, an optional delay and a call counter.
#[derive(Default)]
struct MockFallback {
    answers: HashMap<String, Vec<IpAddr>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockFallback {
    fn new() -> Self {
        Self::default()
    }

    fn with_address(mut self, hostname: &str, address: &str) -> Self {
        self.answers
            .entry(hostname.to_string())
            .or_default()
            .push(address.parse().unwrap());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackSource for MockFallback {
    async fn lookup_all(&self, hostname: &str) -> io::Result<Vec<IpAddr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        match self.answers.get(hostname) {
            Some(addresses) => Ok(addresses.clone()),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "mock enotfound")),
        }
    }
}

fn test_config() -> Config {
    Config::default()
}

fn resolver_with(dns: Arc<MockDns>, fallback: Arc<MockFallback>) -> CachedResolver {
    CachedResolver::builder()
        .config(test_config())
        .dns_source(dns)
        .fallback_source(fallback)
        .rng_seed(42)
        .build()
}

// == Deduplication ==

#[tokio::test]
async fn concurrent_queries_trigger_one_resolution() {
    let dns = Arc::new(
        MockDns::new()
            .with_a("example.com", "1.1.1.1", 60)
            .with_delay(Duration::from_millis(50)),
    );
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(200)));
    let resolver = resolver_with(Arc::clone(&dns), Arc::clone(&fallback));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(
            async move { resolver.query("example.com").await },
        ));
    }

    for handle in handles {
        let entries = handle.await.unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].address.to_string(), "1.1.1.1");
    }

    // One resolution = one resolve4 + one resolve6
    assert_eq!(dns.calls(), 2);
    assert!(fallback.calls() <= 1);
}

// == TTL Respect ==

#[tokio::test]
async fn entries_expire_after_their_ttl() {
    let dns = Arc::new(MockDns::new().with_a("short.com", "1.1.1.1", 1));
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));
    let resolver = resolver_with(Arc::clone(&dns), fallback);

    resolver.query("short.com").await.unwrap();
    let after_first = dns.calls();

    // Within the TTL: served from cache
    resolver.query("short.com").await.unwrap();
    assert_eq!(dns.calls(), after_first);

    // Past the TTL: resolved again
    tokio::time::sleep(Duration::from_millis(1100)).await;
    resolver.query("short.com").await.unwrap();
    assert!(dns.calls() > after_first);
}

// == Race Correctness ==

#[tokio::test]
async fn faster_authoritative_path_wins_and_is_cached() {
    let dns = Arc::new(
        MockDns::new()
            .with_a("raced.com", "1.1.1.1", 60)
            .with_delay(Duration::from_millis(10)),
    );
    let fallback = Arc::new(
        MockFallback::new()
            .with_address("raced.com", "2.2.2.2")
            .with_delay(Duration::from_millis(50)),
    );
    let resolver = resolver_with(Arc::clone(&dns), Arc::clone(&fallback));

    let entries = resolver.query("raced.com").await.unwrap();
    assert_eq!(entries[0].address.to_string(), "1.1.1.1");

    // The cache holds the authoritative answer
    tokio::time::sleep(Duration::from_millis(100)).await;
    let cached = resolver.query("raced.com").await.unwrap();
    assert_eq!(cached[0].address.to_string(), "1.1.1.1");
}

#[tokio::test]
async fn faster_fallback_answers_caller_then_authoritative_is_reconciled() {
    let dns = Arc::new(
        MockDns::new()
            .with_a("raced.com", "1.1.1.1", 60)
            .with_delay(Duration::from_millis(80)),
    );
    let fallback = Arc::new(
        MockFallback::new()
            .with_address("raced.com", "2.2.2.2")
            .with_delay(Duration::from_millis(10)),
    );
    let resolver = resolver_with(Arc::clone(&dns), Arc::clone(&fallback));

    // Caller is not blocked on the slower authoritative path
    let entries = resolver.query("raced.com").await.unwrap();
    assert_eq!(entries[0].address.to_string(), "2.2.2.2");

    // Background reconciliation commits the authoritative result, which
    // carries real TTLs and is preferred for future hits
    tokio::time::sleep(Duration::from_millis(150)).await;
    let cached = resolver.query("raced.com").await.unwrap();
    assert_eq!(cached[0].address.to_string(), "1.1.1.1");
}

// == Fallback Preference ==

#[tokio::test]
async fn failed_authoritative_path_is_skipped_on_subsequent_queries() {
    let dns = Arc::new(MockDns::new().failing());
    let fallback = Arc::new(MockFallback::new().with_address("flaky.com", "2.2.2.2"));
    let resolver = resolver_with(Arc::clone(&dns), Arc::clone(&fallback));

    let entries = resolver.query("flaky.com").await.unwrap();
    assert_eq!(entries[0].address.to_string(), "2.2.2.2");

    // Let any background reconciliation settle before counting
    tokio::time::sleep(Duration::from_millis(50)).await;
    let dns_calls_after_first = dns.calls();
    assert!(dns_calls_after_first > 0);

    // Drop the cached record so the next query resolves again
    resolver.clear(Some("flaky.com")).await;

    let entries = resolver.query("flaky.com").await.unwrap();
    assert_eq!(entries[0].address.to_string(), "2.2.2.2");

    // The authoritative path was not consulted again
    assert_eq!(dns.calls(), dns_calls_after_first);
    assert_eq!(fallback.calls(), 2);
}

#[tokio::test]
async fn empty_authoritative_answer_prefers_fallback_afterwards() {
    // Knows nothing about the hostname, but answers quickly and cleanly
    let dns = Arc::new(MockDns::new());
    let fallback = Arc::new(
        MockFallback::new()
            .with_address("fallback-only.com", "2.2.2.2")
            .with_delay(Duration::from_millis(30)),
    );
    let resolver = resolver_with(Arc::clone(&dns), Arc::clone(&fallback));

    let entries = resolver.query("fallback-only.com").await.unwrap();
    assert_eq!(entries[0].address.to_string(), "2.2.2.2");
    assert_eq!(dns.calls(), 2);

    // Drop the cached record so the next query resolves again
    resolver.clear(Some("fallback-only.com")).await;

    let entries = resolver.query("fallback-only.com").await.unwrap();
    assert_eq!(entries[0].address.to_string(), "2.2.2.2");

    // The empty authoritative answer demoted the path; only the fallback ran
    assert_eq!(dns.calls(), 2);
    assert_eq!(fallback.calls(), 2);
}

// == Negative Caching ==

#[tokio::test]
async fn not_found_is_cached_and_does_not_requery() {
    let dns = Arc::new(MockDns::new());
    let fallback = Arc::new(MockFallback::new());
    let resolver = resolver_with(Arc::clone(&dns), Arc::clone(&fallback));

    let error = resolver
        .lookup("doesnotexist.invalid", LookupOptions::default())
        .await
        .unwrap_err();
    assert!(error.is_not_found());

    let dns_calls = dns.calls();
    let fallback_calls = fallback.calls();

    // Within the negative-TTL window: answered from the negative record
    let error = resolver
        .lookup("doesnotexist.invalid", LookupOptions::default())
        .await
        .unwrap_err();
    assert!(error.is_not_found());

    assert_eq!(dns.calls(), dns_calls);
    assert_eq!(fallback.calls(), fallback_calls);

    // The raw query sees the negative record as an empty list
    let raw = resolver.query("doesnotexist.invalid").await.unwrap();
    assert!(raw.is_empty());
}

// == Shaping ==

#[tokio::test]
async fn v4_mapped_synthesis_when_no_native_ipv6() {
    let dns = Arc::new(MockDns::new().with_a("v4only.com", "1.1.1.1", 60));
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));
    let resolver = resolver_with(dns, fallback);

    let options = LookupOptions {
        family: Some(AddressFamily::V6),
        hints: LookupHints {
            v4_mapped: true,
            addr_config: false,
        },
    };

    let entries = resolver.lookup_all("v4only.com", options).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].family(), AddressFamily::V6);
    assert_eq!(entries[0].address.to_string(), "::ffff:1.1.1.1");
}

#[tokio::test]
async fn family_mismatch_without_hint_is_not_found() {
    let dns = Arc::new(MockDns::new().with_a("v4only.com", "1.1.1.1", 60));
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));
    let resolver = resolver_with(dns, fallback);

    let error = resolver
        .lookup("v4only.com", LookupOptions::family(AddressFamily::V6))
        .await
        .unwrap_err();
    assert!(error.is_not_found());
}

#[tokio::test]
async fn authoritative_entries_are_ordered_family_4_before_6() {
    let dns = Arc::new(
        MockDns::new()
            .with_a("dual.com", "1.1.1.1", 60)
            .with_aaaa("dual.com", "::1", 60),
    );
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));
    let resolver = resolver_with(dns, fallback);

    let entries = resolver
        .lookup_all("dual.com", LookupOptions::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].family(), AddressFamily::V4);
    assert_eq!(entries[1].family(), AddressFamily::V6);
}

// == Round-Robin Selection ==

#[tokio::test]
async fn single_lookup_spreads_across_entries() {
    let dns = Arc::new(
        MockDns::new()
            .with_a("multi.com", "1.1.1.1", 60)
            .with_a("multi.com", "2.2.2.2", 60),
    );
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));
    let resolver = resolver_with(dns, fallback);

    let mut counts: HashMap<String, u32> = HashMap::new();
    for _ in 0..200 {
        let entry = resolver
            .lookup("multi.com", LookupOptions::default())
            .await
            .unwrap();
        *counts.entry(entry.address.to_string()).or_default() += 1;
    }

    // Statistical property: each entry selected with roughly equal frequency
    assert_eq!(counts.len(), 2);
    for count in counts.values() {
        assert!((60..=140).contains(count), "skewed selection: {counts:?}");
    }
}

// == Hosts Override ==

#[tokio::test]
async fn hosts_override_bypasses_store_and_network() {
    let dns = Arc::new(MockDns::new());
    let fallback = Arc::new(MockFallback::new());
    let hosts = Arc::new(StaticHosts::new());
    hosts.add("router.local", "192.168.1.1".parse().unwrap()).await;

    let resolver = CachedResolver::builder()
        .config(test_config())
        .dns_source(dns.clone())
        .fallback_source(fallback.clone())
        .hosts(hosts)
        .build();

    let entries = resolver.query("router.local").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].address.to_string(), "192.168.1.1");
    assert_eq!(entries[0].ttl, u64::MAX);
    assert_eq!(entries[0].expires, u64::MAX);

    assert_eq!(dns.calls(), 0);
    assert_eq!(fallback.calls(), 0);
}

struct UnreadableHosts;

#[async_trait]
impl HostsOverride for UnreadableHosts {
    async fn get(&self, _hostname: &str) -> io::Result<Option<Vec<cacheable_dns::Entry>>> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "hosts file unreadable",
        ))
    }
}

#[tokio::test]
async fn hosts_io_error_surfaces_to_the_caller() {
    let resolver = CachedResolver::builder()
        .config(test_config())
        .dns_source(Arc::new(MockDns::new()))
        .fallback_source(Arc::new(MockFallback::new()))
        .hosts(Arc::new(UnreadableHosts))
        .build();

    let error = resolver.query("any.com").await.unwrap_err();
    assert!(matches!(error, ResolveError::Io(_)));
}

// == Interface Filtering ==

struct V4OnlyInterfaces;

impl InterfaceProvider for V4OnlyInterfaces {
    fn interfaces(&self) -> IfaceInfo {
        IfaceInfo {
            has4: true,
            has6: false,
        }
    }
}

#[tokio::test]
async fn addr_config_filters_unavailable_families() {
    let dns = Arc::new(
        MockDns::new()
            .with_a("dual.com", "1.1.1.1", 60)
            .with_aaaa("dual.com", "::1", 60),
    );
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));

    let resolver = CachedResolver::builder()
        .config(test_config())
        .dns_source(dns)
        .fallback_source(fallback)
        .interface_provider(Arc::new(V4OnlyInterfaces))
        .build();

    let options = LookupOptions {
        family: None,
        hints: LookupHints {
            v4_mapped: false,
            addr_config: true,
        },
    };

    let entries = resolver.lookup_all("dual.com", options).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].family(), AddressFamily::V4);
}

#[tokio::test]
async fn update_interface_info_clears_the_store() {
    let dns = Arc::new(MockDns::new().with_a("example.com", "1.1.1.1", 60));
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));
    let resolver = CachedResolver::builder()
        .config(test_config())
        .dns_source(dns.clone())
        .fallback_source(fallback)
        .interface_provider(Arc::new(AssumeAll))
        .build();

    resolver.query("example.com").await.unwrap();
    let calls = dns.calls();

    resolver.update_interface_info().await;

    resolver.query("example.com").await.unwrap();
    assert!(dns.calls() > calls, "store should have been cleared");
}

// == Maintenance Operations ==

#[tokio::test]
async fn clear_and_tick() {
    let dns = Arc::new(MockDns::new().with_a("example.com", "1.1.1.1", 60));
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));
    let resolver = resolver_with(Arc::clone(&dns), fallback);

    resolver.query("example.com").await.unwrap();
    let calls = dns.calls();

    resolver.clear(None).await;
    resolver.query("example.com").await.unwrap();
    assert!(dns.calls() > calls);

    // Nothing has expired yet, so a forced sweep removes nothing
    assert_eq!(resolver.tick().await, 0);
}

#[tokio::test]
async fn stats_track_hits_and_misses() {
    let dns = Arc::new(MockDns::new().with_a("example.com", "1.1.1.1", 60));
    let fallback = Arc::new(MockFallback::new().with_delay(Duration::from_millis(100)));
    let resolver = resolver_with(dns, fallback);

    resolver.query("example.com").await.unwrap(); // miss
    resolver.query("example.com").await.unwrap(); // hit

    let stats = resolver.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

// == Server Management ==

#[tokio::test]
async fn server_list_roundtrip() {
    let dns = Arc::new(MockDns::new());
    let fallback = Arc::new(MockFallback::new());
    let resolver = resolver_with(Arc::clone(&dns), fallback);

    let servers: Vec<SocketAddr> = vec!["9.9.9.9:53".parse().unwrap()];
    resolver.set_servers(servers.clone()).await;
    assert_eq!(resolver.servers().await, servers);
}

// == Agent Installation ==

#[tokio::test]
async fn install_and_uninstall_are_owner_checked() {
    let resolver = resolver_with(Arc::new(MockDns::new()), Arc::new(MockFallback::new()));
    let other = resolver_with(Arc::new(MockDns::new()), Arc::new(MockFallback::new()));
    let mut agent = BasicAgent::new();

    resolver.install(&mut agent).unwrap();

    // Double install is a configuration error
    assert!(matches!(
        resolver.install(&mut agent).unwrap_err(),
        ResolveError::AlreadyInstalled
    ));
    assert!(matches!(
        other.install(&mut agent).unwrap_err(),
        ResolveError::AlreadyInstalled
    ));

    // Only the installing instance may uninstall
    assert!(matches!(
        other.uninstall(&mut agent).unwrap_err(),
        ResolveError::NotOwned
    ));
    resolver.uninstall(&mut agent).unwrap();

    // After restore, uninstalling again is a no-op
    resolver.uninstall(&mut agent).unwrap();
}
