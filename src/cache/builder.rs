//! Cache Builder Module
//!
//! Assembles a [`Cache`] from named options and starts its eviction task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::listener::RemovalListener;
use crate::cache::store::Store;
use crate::cache::{Cache, CacheKey, CacheValue};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::{spawn_eviction_task, EvictionProtocol, FixedIntervalSweep};

// == Cache Builder ==
/// Collects cache options. Method call order has no effect on the result.
///
/// ```no_run
/// use std::time::Duration;
/// use mini_cache::{Cache, Record, RemovalEvent};
///
/// # async fn example() -> mini_cache::error::Result<()> {
/// let cache = Cache::<String, String>::builder()
///     .ttl(Duration::from_secs(30))
///     .refresh_on_access(true)
///     .removal_listener(|event: &RemovalEvent<String, String>| {
///         println!("{} left the cache", event.id);
///     })
///     .build()?;
///
/// cache.put(Record::new("greeting".to_string(), "hello".to_string()));
/// # Ok(())
/// # }
/// ```
pub struct CacheBuilder<K, V> {
    config: CacheConfig,
    protocol: Option<Arc<dyn EvictionProtocol<K, V>>>,
    listeners: Vec<Box<dyn RemovalListener<K, V>>>,
}

impl<K: CacheKey, V: CacheValue> CacheBuilder<K, V> {
    pub fn new() -> Self {
        Self::from_config(CacheConfig::default())
    }

    /// Seeds the builder from an existing configuration.
    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            config,
            protocol: None,
            listeners: Vec::new(),
        }
    }

    /// Default TTL for records inserted without one.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = Some(ttl);
        self
    }

    /// Refresh flag applied together with the default TTL.
    pub fn refresh_on_access(mut self, refresh: bool) -> Self {
        self.config.refresh_on_access = Some(refresh);
        self
    }

    /// Replaces the default [`FixedIntervalSweep`].
    pub fn eviction_protocol<P>(mut self, protocol: P) -> Self
    where
        P: EvictionProtocol<K, V> + 'static,
    {
        self.protocol = Some(Arc::new(protocol));
        self
    }

    /// Time between background sweeps.
    pub fn eviction_interval(mut self, interval: Duration) -> Self {
        self.config.eviction_interval = Some(interval);
        self
    }

    /// Turns the background task on or off regardless of the other options.
    pub fn enable_eviction(mut self, enabled: bool) -> Self {
        self.config.enable_eviction = Some(enabled);
        self
    }

    /// Appends a listener; listeners are notified in the order they were added.
    pub fn removal_listener<L>(mut self, listener: L) -> Self
    where
        L: RemovalListener<K, V> + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    // == Build ==
    /// Validates the configuration and returns a running cache.
    ///
    /// With eviction enabled this spawns the background task and so must run
    /// inside a tokio runtime.
    pub fn build(self) -> Result<Cache<K, V>> {
        self.config.validate()?;

        let eviction_enabled = self.config.eviction_enabled(self.protocol.is_some());
        let interval = self.config.interval();
        debug!(
            "Building cache: ttl={:?}, refresh_on_access={}, eviction_enabled={}, interval={}ms, listeners={}",
            self.config.default_ttl,
            self.config.refresh_on_access.unwrap_or(false),
            eviction_enabled,
            interval.as_millis(),
            self.listeners.len()
        );

        let store = Arc::new(Store::new(
            self.config.default_ttl,
            self.config.refresh_on_access.unwrap_or(false),
            self.listeners,
        ));
        let shutdown = CancellationToken::new();

        let eviction = if eviction_enabled {
            let protocol: Arc<dyn EvictionProtocol<K, V>> = match self.protocol {
                Some(protocol) => protocol,
                None => Arc::new(FixedIntervalSweep),
            };
            Some(spawn_eviction_task(
                protocol,
                store.clone(),
                interval,
                shutdown.clone(),
            )?)
        } else {
            None
        };

        Ok(Cache::from_parts(store, shutdown, eviction))
    }
}

impl<K: CacheKey, V: CacheValue> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
