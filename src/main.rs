//! Cacheable DNS - command line lookup tool
//!
//! Resolves each hostname given on the command line through the caching
//! resolver and prints the answers as JSON lines.

use anyhow::Context;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cacheable_dns::{CachedResolver, Config, LookupOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cacheable_dns=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let hostnames: Vec<String> = std::env::args().skip(1).collect();
    if hostnames.is_empty() {
        anyhow::bail!("usage: cacheable-dns <hostname> [hostname ...]");
    }

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        "Configuration loaded: max_ttl={:?}, fallback_ttl={}s, error_ttl={}ms",
        config.max_ttl, config.fallback_ttl, config.error_ttl_ms
    );

    let resolver = CachedResolver::builder().config(config).build();

    for hostname in &hostnames {
        let entries = resolver
            .lookup_all(hostname, LookupOptions::default())
            .await
            .with_context(|| format!("resolving {hostname}"))?;

        for entry in entries {
            println!(
                "{}",
                json!({
                    "hostname": hostname,
                    "address": entry.address,
                    "family": entry.family().as_number(),
                    "ttl": entry.ttl,
                })
            );
        }
    }

    resolver.shutdown();
    Ok(())
}
