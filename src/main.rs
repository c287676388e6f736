//! Mini Cache - demo runner
//!
//! Builds a cache from environment configuration, feeds it records with
//! different lifetimes and logs what happens to them.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_cache::{Cache, CacheBuilder, CacheConfig, Record, RemovalEvent};

/// Entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache, which starts background eviction
/// 4. Insert records: permanent, short-lived and refreshing
/// 5. Read them back over time, or stop early on Ctrl+C
/// 6. Print statistics and shut down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini Cache demo");

    let mut config = CacheConfig::from_env();
    if config.eviction_interval.is_none() {
        config.eviction_interval = Some(Duration::from_millis(250));
    }
    info!(
        "Configuration loaded: default_ttl={:?}, refresh_on_access={:?}, eviction_interval={}ms",
        config.default_ttl,
        config.refresh_on_access,
        config.interval().as_millis()
    );

    let cache = CacheBuilder::from_config(config)
        .removal_listener(|event: &RemovalEvent<String, String>| {
            info!("{} ({}) was removed: {:?}", event.id, event.value, event.cause);
        })
        .build()
        .context("failed to build cache")?;

    cache.put(Record::new("jurassic-park".to_string(), "1993".to_string()));
    cache.put(
        Record::new("the-lost-world".to_string(), "1997".to_string())
            .with_ttl(Duration::from_millis(500)),
    );
    let refreshing = cache.put(
        Record::new("jurassic-world".to_string(), "2015".to_string())
            .with_ttl(Duration::from_millis(800))
            .refresh_on_access(true),
    );

    tokio::select! {
        _ = exercise(&cache, refreshing) => {}
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping early");
        }
    }

    let stats = serde_json::to_string_pretty(&cache.stats()).context("failed to encode stats")?;
    info!("Final statistics:\n{}", stats);

    cache.shutdown();
    info!("Demo complete");
    Ok(())
}

/// Keeps one record alive by reading it, then lets everything lapse.
async fn exercise(cache: &Cache<String, String>, refreshing: String) {
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(400)).await;
        info!("{} -> {:?}", refreshing, cache.get(&refreshing));
    }

    tokio::time::sleep(Duration::from_millis(1200)).await;
    for key in ["jurassic-park", "the-lost-world", "jurassic-world"] {
        info!("{} -> {:?}", key, cache.get(&key.to_string()));
    }
}
