//! Cache Store Module
//!
//! Shared storage core used by the cache facade and the background eviction task.
//!
//! Every check-and-remove happens under the map lock, so exactly one caller
//! takes a given record out of the map and only that caller notifies the
//! listeners. Listeners run after the lock is released.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cache::listener::{notify_all, RemovalCause, RemovalEvent, RemovalListener};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::{CacheKey, CacheValue, Record};

/// Outcome of the locked part of a read.
enum Lookup<V> {
    Missing,
    Live(V),
    Expired,
}

// == Store ==
pub(crate) struct Store<K, V> {
    /// Records keyed by their id
    entries: Mutex<HashMap<K, Record<K, V>>>,
    /// Removal observers in registration order
    listeners: Vec<Box<dyn RemovalListener<K, V>>>,
    /// Hit/miss/removal counters
    stats: StatsRecorder,
    /// TTL for records inserted without one
    default_ttl: Option<Duration>,
    /// Refresh flag paired with `default_ttl`
    default_refresh: bool,
}

impl<K: CacheKey, V: CacheValue> Store<K, V> {
    // == Constructor ==
    pub(crate) fn new(
        default_ttl: Option<Duration>,
        default_refresh: bool,
        listeners: Vec<Box<dyn RemovalListener<K, V>>>,
    ) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            listeners,
            stats: StatsRecorder::default(),
            default_ttl,
            default_refresh,
        }
    }

    // == Insert ==
    /// Stores a record, applying the default TTL if it has none.
    ///
    /// Replacing an existing record is not a removal and fires no event.
    pub(crate) fn insert(&self, mut record: Record<K, V>) -> K {
        if let (Some(ttl), None) = (self.default_ttl, record.ttl()) {
            record.apply_default_expiry(ttl, self.default_refresh);
        }
        trace!("Entry ttl -> {:?}", record.ttl());

        let id = record.id().clone();
        let replaced = self.entries.lock().insert(id.clone(), record);
        if replaced.is_some() {
            trace!("Replaced existing record -> {:?}", id);
        }
        id
    }

    // == Get ==
    /// Reads a value, refreshing it first and evicting it if it has expired.
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let lookup = match entries.get_mut(key) {
            None => Lookup::Missing,
            Some(record) => {
                record.access();
                if record.is_expired() {
                    Lookup::Expired
                } else {
                    Lookup::Live(record.value().clone())
                }
            }
        };

        let evicted = match lookup {
            Lookup::Missing => {
                drop(entries);
                self.stats.record_miss();
                return None;
            }
            Lookup::Live(value) => {
                drop(entries);
                trace!("Returning entry from cache -> {:?}", key);
                self.stats.record_hit();
                return Some(value);
            }
            Lookup::Expired => entries.remove(key),
        };
        drop(entries);

        trace!("Removing expired entry on access -> {:?}", key);
        self.stats.record_miss();
        if let Some(record) = evicted {
            self.emit(record, RemovalCause::Expired);
        }
        None
    }

    // == Contains ==
    /// Checks for a live record without refreshing or evicting it.
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.entries.lock()
            .get(key)
            .is_some_and(|record| !record.is_expired())
    }

    // == Remove ==
    /// Removes a record unconditionally, notifying listeners if it was present.
    pub(crate) fn remove(&self, key: &K) -> Option<V> {
        let removed = self.entries.lock().remove(key);
        let Some(record) = removed else {
            trace!("No record was found to be removed -> {:?}", key);
            return None;
        };

        self.stats.record_invalidation();
        Some(self.emit(record, RemovalCause::Invalidated))
    }

    // == Evict If Expired ==
    /// Removes the record under `key` only if it is still present and expired.
    ///
    /// Returns true if this call performed the eviction.
    pub(crate) fn evict_if_expired(&self, key: &K) -> bool {
        let evicted = {
            let mut entries = self.entries.lock();
            let expired = entries.get(key).is_some_and(Record::is_expired);
            if expired {
                entries.remove(key)
            } else {
                None
            }
        };

        match evicted {
            Some(record) => {
                self.emit(record, RemovalCause::Expired);
                true
            }
            None => false,
        }
    }

    // == Sweep ==
    /// Full scan over a snapshot of the key set, evicting expired records.
    ///
    /// Keys inserted during the scan wait for the next one; keys removed
    /// concurrently are skipped. Returns the number of records evicted.
    pub(crate) fn sweep(&self) -> usize {
        let keys = self.keys();
        let removed = keys.iter().filter(|key| self.evict_if_expired(key)).count();
        if removed > 0 {
            debug!("Sweep removed {} of {} records", removed, keys.len());
        }
        removed
    }

    pub(crate) fn keys(&self) -> Vec<K> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Earliest expiry among stored records.
    pub(crate) fn next_expiry(&self) -> Option<Instant> {
        self.entries.lock().values().filter_map(Record::expires_at).min()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    /// Fires one event for a record already taken out of the map and hands the value back.
    fn emit(&self, record: Record<K, V>, cause: RemovalCause) -> V {
        if cause == RemovalCause::Expired {
            self.stats.record_expiration();
        }
        let (id, value) = record.into_parts();
        debug!("Removing record -> {:?} ({:?})", id, cause);

        let event = RemovalEvent::new(id, value, cause);
        notify_all(&self.listeners, &event);
        event.value
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};
    use tokio::time::{advance, sleep};

    fn counting_store(
        default_ttl: Option<Duration>,
        default_refresh: bool,
    ) -> (Store<String, String>, Arc<AtomicUsize>) {
        let removals = Arc::new(AtomicUsize::new(0));
        let counter = removals.clone();
        let listener: Box<dyn RemovalListener<String, String>> =
            Box::new(move |_: &RemovalEvent<String, String>| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let store = Store::new(default_ttl, default_refresh, vec![listener]);
        (store, removals)
    }

    fn record(key: &str, value: &str) -> Record<String, String> {
        Record::new(key.to_string(), value.to_string())
    }

    #[test]
    fn test_store_insert_and_get() {
        let (store, _) = counting_store(None, false);

        let id = store.insert(record("key1", "value1"));

        assert_eq!(id, "key1");
        assert_eq!(store.get(&id), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (store, _) = counting_store(None, false);

        assert_eq!(store.get(&"missing".to_string()), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_overwrite_fires_no_event() {
        let (store, removals) = counting_store(None, false);

        store.insert(record("key1", "value1"));
        store.insert(record("key1", "value2"));

        assert_eq!(store.get(&"key1".to_string()), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(removals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_store_remove() {
        let (store, removals) = counting_store(None, false);
        store.insert(record("key1", "value1"));

        assert_eq!(store.remove(&"key1".to_string()), Some("value1".to_string()));
        assert_eq!(store.remove(&"key1".to_string()), None);

        assert_eq!(removals.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().invalidations, 1);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_default_ttl_applied_only_without_own_ttl() {
        let (store, _) = counting_store(Some(Duration::from_secs(60)), true);

        store.insert(record("default", "v"));
        store.insert(record("own", "v").with_ttl(Duration::from_secs(5)));

        let entries = store.entries.lock();
        let default = &entries["default"];
        assert_eq!(default.ttl(), Some(Duration::from_secs(60)));
        assert!(default.refreshes_on_access());

        let own = &entries["own"];
        assert_eq!(own.ttl(), Some(Duration::from_secs(5)));
        assert!(!own.refreshes_on_access());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_lazy_eviction() {
        let (store, removals) = counting_store(None, false);
        store.insert(record("key1", "value1").with_ttl(Duration::from_millis(100)));

        assert!(store.get(&"key1".to_string()).is_some());
        sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get(&"key1".to_string()), None);
        assert_eq!(store.get(&"key1".to_string()), None);
        assert_eq!(removals.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().expirations, 1);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_happens_before_expiry_check() {
        let ttl = Duration::from_millis(100);
        let (store, removals) = counting_store(Some(ttl), true);
        store.insert(record("hot", "value"));
        let deadline = store.entries.lock()["hot"].expires_at().unwrap();

        // Exactly on the deadline
        advance(ttl).await;
        assert_eq!(Instant::now(), deadline);
        assert_eq!(store.get(&"hot".to_string()), Some("value".to_string()));
        assert_eq!(
            store.entries.lock()["hot"].expires_at(),
            Some(Instant::now() + ttl)
        );

        // Past the refreshed deadline with no sweep in between
        advance(ttl + Duration::from_millis(50)).await;
        assert_eq!(store.get(&"hot".to_string()), Some("value".to_string()));
        assert_eq!(
            store.entries.lock()["hot"].expires_at(),
            Some(Instant::now() + ttl)
        );
        assert_eq!(removals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_refreshing_record_expires_just_past_deadline() {
        let ttl = Duration::from_millis(100);
        let (store, removals) = counting_store(Some(ttl), false);
        store.insert(record("cold", "value"));

        advance(ttl).await;
        assert_eq!(store.get(&"cold".to_string()), Some("value".to_string()));

        advance(Duration::from_millis(1)).await;
        assert_eq!(store.get(&"cold".to_string()), None);
        assert_eq!(removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_contains_does_not_refresh() {
        let (store, _) = counting_store(None, false);
        store.insert(
            record("key1", "value1")
                .with_ttl(Duration::from_millis(100))
                .refresh_on_access(true),
        );

        sleep(Duration::from_millis(80)).await;
        assert!(store.contains(&"key1".to_string()));

        sleep(Duration::from_millis(40)).await;
        assert!(!store.contains(&"key1".to_string()));
        // Peeking never evicts
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sweep() {
        let (store, removals) = counting_store(None, false);
        store.insert(record("short", "v").with_ttl(Duration::from_millis(100)));
        store.insert(record("long", "v").with_ttl(Duration::from_secs(10)));
        store.insert(record("forever", "v"));

        let short_expiry = store.entries.lock()["short"].expires_at();
        assert_eq!(store.next_expiry(), short_expiry);
        sleep(Duration::from_millis(150)).await;

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(removals.load(Ordering::SeqCst), 1);
        assert!(!store.evict_if_expired(&"long".to_string()));
        assert!(!store.evict_if_expired(&"missing".to_string()));
    }

    #[test]
    fn test_listener_may_reenter_store() {
        let store: Arc<Store<u32, u32>> = Arc::new_cyclic(|weak: &Weak<Store<u32, u32>>| {
            let weak = weak.clone();
            let listener: Box<dyn RemovalListener<u32, u32>> =
                Box::new(move |event: &RemovalEvent<u32, u32>| {
                    // Runs outside the lock, so calling back in must not deadlock
                    if let Some(store) = weak.upgrade() {
                        store.insert(Record::new(event.id + 100, event.value));
                    }
                });
            Store::new(None, false, vec![listener])
        });

        store.insert(Record::new(1, 10));
        assert_eq!(store.remove(&1), Some(10));
        assert_eq!(store.get(&101), Some(10));
    }

    #[test]
    fn test_panic_while_locked_leaves_store_usable() {
        let (store, _) = counting_store(None, false);
        let store = Arc::new(store);
        store.insert(record("key1", "value1"));

        let holder = store.clone();
        let outcome = std::thread::spawn(move || {
            let _guard = holder.entries.lock();
            panic!("panicked while holding the map lock");
        })
        .join();
        assert!(outcome.is_err());

        assert_eq!(store.get(&"key1".to_string()), Some("value1".to_string()));
        assert_eq!(store.remove(&"key1".to_string()), Some("value1".to_string()));
    }
}
