//! Mini Cache - A lightweight in-process key-value cache
//!
//! Provides TTL expiration with refresh-on-access, lazy and background
//! eviction, and removal listeners.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{
    Cache, CacheBuilder, CacheStats, Record, RemovalCause, RemovalEvent, RemovalListener,
};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::{EvictionProtocol, FixedIntervalSweep, NearestExpirySweep, Sweeper};
