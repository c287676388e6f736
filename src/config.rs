//! Configuration Module
//!
//! Explicit cache configuration, loadable from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Sweep cadence used when no interval is configured.
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_millis(5000);

/// Cache configuration parameters.
///
/// Every field is optional so that "explicitly set" is distinguishable from
/// "left at the default". Whether background eviction runs is derived from
/// that distinction by [`CacheConfig::eviction_enabled`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Default TTL applied to records that carry none of their own
    pub default_ttl: Option<Duration>,
    /// Default refresh-on-access flag applied alongside the default TTL
    pub refresh_on_access: Option<bool>,
    /// Pause between background sweeps
    pub eviction_interval: Option<Duration>,
    /// Authoritative on/off switch for the background task
    pub enable_eviction: Option<bool>,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// Unset or unparseable variables leave the field unset.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds
    /// - `CACHE_REFRESH_ON_ACCESS` - `true`/`false`
    /// - `CACHE_EVICTION_INTERVAL_MS` - Sweep interval in milliseconds
    /// - `CACHE_EVICTION_ENABLED` - `true`/`false`
    pub fn from_env() -> Self {
        Self {
            default_ttl: env::var("CACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
            refresh_on_access: env::var("CACHE_REFRESH_ON_ACCESS")
                .ok()
                .and_then(|v| v.parse().ok()),
            eviction_interval: env::var("CACHE_EVICTION_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
            enable_eviction: env::var("CACHE_EVICTION_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    // == Eviction Enabled ==
    /// Resolves whether the background eviction task should run.
    ///
    /// `enable_eviction` wins when set. Otherwise eviction is on as soon as any
    /// eviction-related option was given, including a custom protocol.
    pub fn eviction_enabled(&self, custom_protocol: bool) -> bool {
        self.enable_eviction.unwrap_or(
            self.default_ttl.is_some()
                || self.refresh_on_access.is_some()
                || self.eviction_interval.is_some()
                || custom_protocol,
        )
    }

    /// Returns the configured sweep interval or [`DEFAULT_EVICTION_INTERVAL`].
    pub fn interval(&self) -> Duration {
        self.eviction_interval.unwrap_or(DEFAULT_EVICTION_INTERVAL)
    }

    /// Rejects values that would produce a misbehaving cache.
    ///
    /// The interval is only checked when it will drive a background task;
    /// with eviction switched off it is ignored.
    pub fn validate(&self) -> Result<()> {
        if self.eviction_enabled(false) && self.eviction_interval == Some(Duration::ZERO) {
            return Err(CacheError::InvalidConfig(
                "eviction interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
