//! Removal Notification Module
//!
//! Events emitted when a record leaves the cache and the listeners that observe them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::error;

// == Removal Cause ==
/// Why a record left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCause {
    /// The record's TTL elapsed (lazy eviction on read or background sweep)
    Expired,
    /// The record was removed explicitly
    Invalidated,
}

// == Removal Event ==
/// A record that has just been removed. Built once per removal and shared
/// by reference with every listener.
#[derive(Debug, Clone)]
pub struct RemovalEvent<K, V> {
    pub id: K,
    pub value: V,
    pub cause: RemovalCause,
}

impl<K, V> RemovalEvent<K, V> {
    pub fn new(id: K, value: V, cause: RemovalCause) -> Self {
        Self { id, value, cause }
    }
}

// == Removal Listener ==
/// Observer invoked synchronously, in registration order, for every removal.
///
/// Runs on whichever thread discovered the removal: a reader doing lazy
/// eviction, an explicit `remove`, or the background sweep. The cache lock is
/// not held, so listeners may call back into the cache.
pub trait RemovalListener<K, V>: Send + Sync {
    fn on_removal(&self, event: &RemovalEvent<K, V>);
}

impl<K, V, F> RemovalListener<K, V> for F
where
    F: Fn(&RemovalEvent<K, V>) + Send + Sync,
{
    fn on_removal(&self, event: &RemovalEvent<K, V>) {
        self(event)
    }
}

// == Notify ==
/// Delivers `event` to each listener in order.
///
/// A panicking listener is logged and skipped; the remaining listeners still run.
pub(crate) fn notify_all<K, V>(
    listeners: &[Box<dyn RemovalListener<K, V>>],
    event: &RemovalEvent<K, V>,
) where
    K: std::fmt::Debug,
{
    for (index, listener) in listeners.iter().enumerate() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_removal(event)));
        if let Err(payload) = outcome {
            error!(
                "Removal listener #{} panicked for {:?}: {}",
                index,
                event.id,
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
