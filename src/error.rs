//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache construction.
///
/// Cache operations themselves never fail: a missing or expired key is `None`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration values that cannot produce a working cache
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Background eviction requested outside of a tokio runtime
    #[error("Background eviction requires a running tokio runtime")]
    NoRuntime,
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CacheError::InvalidConfig("eviction interval must be greater than zero".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: eviction interval must be greater than zero"
        );
        assert_eq!(
            CacheError::NoRuntime.to_string(),
            "Background eviction requires a running tokio runtime"
        );
    }
}
