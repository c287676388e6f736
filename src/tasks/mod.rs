//! Background Tasks Module
//!
//! Contains the background eviction task that runs for the lifetime of a cache.
//!
//! # Protocols
//! - [`FixedIntervalSweep`]: full scan at a fixed interval (default)
//! - [`NearestExpirySweep`]: wakes when the earliest record is due

mod eviction;

pub(crate) use eviction::spawn_eviction_task;
pub use eviction::{EvictionProtocol, FixedIntervalSweep, NearestExpirySweep, Sweeper};
