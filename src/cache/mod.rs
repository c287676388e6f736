//! Cache Module
//!
//! Provides an in-process key-value cache with TTL expiration, lazy and
//! background eviction, and removal listeners.

mod builder;
mod facade;
mod listener;
mod record;
mod stats;
pub(crate) mod store;


// Re-export public types
pub use builder::CacheBuilder;
pub use facade::Cache;
pub use listener::{RemovalCause, RemovalEvent, RemovalListener};
pub use record::{CacheKey, CacheValue, Record};
pub(crate) use record::deadline_after;
pub use stats::CacheStats;
