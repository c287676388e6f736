//! Cache Facade Module
//!
//! The public cache type: record storage plus its background eviction task.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::builder::CacheBuilder;
use crate::cache::store::Store;
use crate::cache::{CacheKey, CacheStats, CacheValue, Record};

// == Cache ==
/// Thread-safe key-value cache with TTL expiry and removal notification.
///
/// Created through [`Cache::builder`]. Share it between tasks or threads by
/// wrapping it in an `Arc`; dropping it stops the background eviction task.
pub struct Cache<K, V> {
    store: Arc<Store<K, V>>,
    shutdown: CancellationToken,
    eviction: Option<JoinHandle<()>>,
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> {
    /// Starts configuring a new cache.
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    pub(crate) fn from_parts(
        store: Arc<Store<K, V>>,
        shutdown: CancellationToken,
        eviction: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            store,
            shutdown,
            eviction,
        }
    }

    // == Put ==
    /// Inserts or replaces a record and returns its id.
    ///
    /// A record without its own TTL receives the cache default. Replacing an
    /// existing id does not notify removal listeners.
    pub fn put(&self, record: Record<K, V>) -> K {
        self.store.insert(record)
    }

    // == Get ==
    /// Returns the value for `key` if present and not expired.
    ///
    /// Refresh-on-access records are extended before the expiry check. An
    /// expired record is removed and its listeners notified.
    pub fn get(&self, key: &K) -> Option<V> {
        self.store.get(key)
    }

    // == Remove ==
    /// Removes `key`, notifying listeners, and returns the removed value.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.store.remove(key)
    }

    /// Removes `key` if present. A missing key fires no event.
    pub fn invalidate(&self, key: &K) {
        self.store.remove(key);
    }

    /// Checks for a live record without refreshing or evicting it.
    pub fn contains_key(&self, key: &K) -> bool {
        self.store.contains(key)
    }

    /// Number of stored records, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Whether a background eviction task was started at build time.
    pub fn eviction_enabled(&self) -> bool {
        self.eviction.is_some()
    }

    pub fn is_eviction_running(&self) -> bool {
        self.eviction
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Shutdown ==
    /// Stops the background eviction task. Lazy eviction on read keeps working.
    pub fn shutdown(&self) {
        if self.eviction.is_some() && !self.shutdown.is_cancelled() {
            info!("Stopping eviction task");
        }
        self.shutdown.cancel();
    }
}

impl<K: CacheKey, V: CacheValue> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.len())
            .field("eviction_enabled", &self.eviction_enabled())
            .finish()
    }
}

impl<K, V> Drop for Cache<K, V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
