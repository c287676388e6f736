//! Background Eviction Task
//!
//! Pluggable strategies that periodically remove expired records, and the
//! function that spawns the chosen strategy onto the tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::store::Store;
use crate::cache::{deadline_after, CacheKey, CacheValue};
use crate::error::{CacheError, Result};

// == Sweeper ==
/// Handle through which an eviction protocol reaches the cache's records.
///
/// Every method takes the cache lock briefly and never across an `.await`.
pub struct Sweeper<K, V> {
    store: Arc<Store<K, V>>,
}

impl<K, V> Clone for Sweeper<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<K: CacheKey, V: CacheValue> Sweeper<K, V> {
    pub(crate) fn new(store: Arc<Store<K, V>>) -> Self {
        Self { store }
    }

    /// Scans a snapshot of the key set and evicts every expired record.
    ///
    /// Returns the number of records evicted by this call.
    pub fn sweep(&self) -> usize {
        self.store.sweep()
    }

    /// Evicts one record if it is still present and expired.
    pub fn evict_if_expired(&self, key: &K) -> bool {
        self.store.evict_if_expired(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.store.keys()
    }

    /// Earliest `expires_at` across the cache, `None` if nothing expires.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.store.next_expiry()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Eviction Protocol ==
/// Strategy for the background eviction loop.
///
/// `run` owns the loop: it should keep evicting through `sweeper` until
/// `shutdown` is cancelled and then return. Cancellation is a normal exit.
#[async_trait]
pub trait EvictionProtocol<K, V>: Send + Sync {
    async fn run(&self, sweeper: Sweeper<K, V>, interval: Duration, shutdown: CancellationToken);
}

// == Fixed Interval Sweep ==
/// Default strategy: sleep for the interval, then scan every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedIntervalSweep;

#[async_trait]
impl<K: CacheKey, V: CacheValue> EvictionProtocol<K, V> for FixedIntervalSweep {
    async fn run(&self, sweeper: Sweeper<K, V>, interval: Duration, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(interval) => {}
            }

            log_sweep(sweeper.sweep(), interval);
        }
    }
}

// == Nearest Expiry Sweep ==
/// Wakes when the earliest record is due instead of on a fixed cadence.
///
/// The interval caps the wait, so records inserted with an earlier expiry
/// than the one being waited on are still picked up within one interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestExpirySweep;

#[async_trait]
impl<K: CacheKey, V: CacheValue> EvictionProtocol<K, V> for NearestExpirySweep {
    async fn run(&self, sweeper: Sweeper<K, V>, interval: Duration, shutdown: CancellationToken) {
        // Expiry is strict, so wake one tick after the deadline
        const PAST_DEADLINE: Duration = Duration::from_millis(1);

        loop {
            let cap = deadline_after(Instant::now(), interval);
            let wake = sweeper
                .next_expiry()
                .map_or(cap, |expiry| deadline_after(expiry, PAST_DEADLINE).min(cap));

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep_until(wake) => {}
            }

            log_sweep(sweeper.sweep(), interval);
        }
    }
}

fn log_sweep(removed: usize, interval: Duration) {
    if removed > 0 {
        info!("TTL cleanup: removed {} expired records", removed);
    } else {
        debug!(
            "TTL cleanup: no expired records, sleeping for {}ms",
            interval.as_millis()
        );
    }
}

// == Spawn ==
/// Spawns `protocol` as the background eviction task for `store`.
///
/// Must be called from within a tokio runtime; outside one this fails with
/// [`CacheError::NoRuntime`] rather than panicking.
///
/// # Returns
/// A JoinHandle for the spawned task. The task ends once `shutdown` is cancelled.
pub(crate) fn spawn_eviction_task<K: CacheKey, V: CacheValue>(
    protocol: Arc<dyn EvictionProtocol<K, V>>,
    store: Arc<Store<K, V>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
    let sweeper = Sweeper::new(store);

    Ok(runtime.spawn(async move {
        info!(
            "Starting eviction task with interval of {}ms",
            interval.as_millis()
        );
        protocol.run(sweeper, interval, shutdown).await;
        info!("Eviction task stopped");
    }))
}
