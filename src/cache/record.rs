//! Cache Record Module
//!
//! Defines a single cache record together with its expiry state.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::trace;
use uuid::Uuid;

// == Type Bounds ==
/// Requirements on a cache key.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Requirements on a cached value.
///
/// Reads hand out clones, so large payloads are best stored behind an `Arc`.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

// == Record ==
/// One cached entry: identity, owned value and expiry metadata.
///
/// A record without a TTL of its own picks up the cache default when it is
/// inserted. `expires_at` is `None` exactly when neither supplied one.
#[derive(Debug, Clone)]
pub struct Record<K, V> {
    id: K,
    value: V,
    created_at: Instant,
    ttl: Option<Duration>,
    expires_at: Option<Instant>,
    refresh_on_access: bool,
    accessed_at: Option<Instant>,
}

impl<K, V> Record<K, V> {
    // == Constructor ==
    /// Creates a record that never expires unless the cache applies a default TTL.
    pub fn new(id: K, value: V) -> Self {
        Self {
            id,
            value,
            created_at: Instant::now(),
            ttl: None,
            expires_at: None,
            refresh_on_access: false,
            accessed_at: None,
        }
    }

    /// Gives the record its own TTL, measured from creation.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self.expires_at = Some(deadline_after(self.created_at, ttl));
        self
    }

    /// Sets whether each successful read pushes expiry out by a full TTL.
    ///
    /// Has no effect on a record that ends up without a TTL.
    pub fn refresh_on_access(mut self, refresh: bool) -> Self {
        self.refresh_on_access = refresh;
        self
    }

    // == Accessors ==
    pub fn id(&self) -> &K {
        &self.id
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Last refreshing read, only tracked for refresh-on-access records.
    pub fn accessed_at(&self) -> Option<Instant> {
        self.accessed_at
    }

    pub fn refreshes_on_access(&self) -> bool {
        self.refresh_on_access
    }

    /// Wall-clock creation time.
    pub fn created_time(&self) -> DateTime<Utc> {
        to_wall_clock(self.created_at)
    }

    /// Wall-clock expiry time, `None` if the record never expires.
    pub fn expire_time(&self) -> Option<DateTime<Utc>> {
        self.expires_at.map(to_wall_clock)
    }

    // == Is Expired ==
    /// Checks if the record has expired.
    ///
    /// A record is expired once the current time is strictly past
    /// `expires_at`. Records without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Same as [`Record::is_expired`] against an explicit point in time.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    // == Time Remaining ==
    /// Remaining lifetime, `Some(ZERO)` once expired, `None` if it never expires.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }

    // == Access ==
    /// Records a read. Refreshing records get a new window of `now + ttl`.
    ///
    /// The cache calls this before its expiry check, so a refreshing record
    /// read right at its boundary is served and extended.
    pub(crate) fn access(&mut self)
    where
        K: Debug,
    {
        if !self.refresh_on_access {
            return;
        }
        if let Some(ttl) = self.ttl {
            let now = Instant::now();
            trace!("Refreshing access for {}ms -> {:?}", ttl.as_millis(), self.id);
            self.accessed_at = Some(now);
            self.expires_at = Some(deadline_after(now, ttl));
        }
    }

    // == Apply Default Expiry ==
    /// Applies the cache-level TTL and refresh flag to a record without its own TTL.
    pub(crate) fn apply_default_expiry(&mut self, ttl: Duration, refresh_on_access: bool) {
        self.ttl = Some(ttl);
        self.expires_at = Some(deadline_after(Instant::now(), ttl));
        self.refresh_on_access = refresh_on_access;
    }

    pub(crate) fn into_parts(self) -> (K, V) {
        (self.id, self.value)
    }
}

impl<V> Record<Uuid, V> {
    /// Creates a record keyed by a freshly generated UUID.
    pub fn with_random_id(value: V) -> Self {
        Self::new(Uuid::new_v4(), value)
    }
}

// == Utility Functions ==
/// Roughly 30 years, the same horizon tokio uses for an unbounded sleep.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + ttl` with the TTL capped at [`FAR_FUTURE`], so `Duration::MAX`
/// can be used to mean "effectively forever" without overflowing.
pub(crate) fn deadline_after(from: Instant, ttl: Duration) -> Instant {
    let ttl = ttl.min(FAR_FUTURE);
    from.checked_add(ttl).unwrap_or(from)
}

/// Maps a monotonic instant onto the wall clock relative to now.
fn to_wall_clock(instant: Instant) -> DateTime<Utc> {
    let now = Instant::now();
    let wall_now = Utc::now();
    if instant <= now {
        let elapsed =
            chrono::Duration::from_std(now - instant).unwrap_or_else(|_| chrono::Duration::zero());
        wall_now - elapsed
    } else {
        let ahead =
            chrono::Duration::from_std(instant - now).unwrap_or_else(|_| chrono::Duration::zero());
        wall_now + ahead
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, sleep};

    #[test]
    fn test_record_creation_no_ttl() {
        let record = Record::new("movie", "Jurassic Park");

        assert_eq!(*record.id(), "movie");
        assert_eq!(*record.value(), "Jurassic Park");
        assert!(record.ttl().is_none());
        assert!(record.expires_at().is_none());
        assert!(record.time_remaining().is_none());
        assert!(record.expire_time().is_none());
        assert!(!record.is_expired());
    }

    #[test]
    fn test_record_creation_with_ttl() {
        let record = Record::new(1u32, "value").with_ttl(Duration::from_secs(60));

        assert_eq!(record.ttl(), Some(Duration::from_secs(60)));
        assert_eq!(
            record.expires_at(),
            Some(record.created_at() + Duration::from_secs(60))
        );
        assert!(!record.is_expired());
        assert!(record.expire_time().unwrap() > record.created_time());
    }

    #[test]
    fn test_random_ids_are_unique() {
        let a = Record::with_random_id("a");
        let b = Record::with_random_id("b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let record = Record::new("key", "value").with_ttl(Duration::from_millis(100));
        let expires = record.expires_at().unwrap();

        // Exactly at the boundary is still live, one tick later is expired
        assert!(!record.is_expired_at(expires));
        assert!(record.is_expired_at(expires + Duration::from_millis(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_expiration() {
        let record = Record::new("key", "value").with_ttl(Duration::from_millis(100));
        assert!(!record.is_expired());

        sleep(Duration::from_millis(150)).await;

        assert!(record.is_expired());
        assert_eq!(record.time_remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_refreshes_expiry() {
        let mut record = Record::new("key", "value")
            .with_ttl(Duration::from_millis(300))
            .refresh_on_access(true);
        let first_expiry = record.expires_at().unwrap();

        advance(Duration::from_millis(200)).await;
        record.access();

        let accessed = record.accessed_at().expect("refreshing read is tracked");
        assert_eq!(record.expires_at(), Some(accessed + Duration::from_millis(300)));
        assert!(record.expires_at().unwrap() > first_expiry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_without_refresh_is_noop() {
        let mut record = Record::new("key", "value").with_ttl(Duration::from_millis(300));
        let expiry = record.expires_at();

        advance(Duration::from_millis(200)).await;
        record.access();

        assert_eq!(record.expires_at(), expiry);
        assert!(record.accessed_at().is_none());
    }

    #[test]
    fn test_access_without_ttl_is_noop() {
        let mut record = Record::new("key", "value").refresh_on_access(true);
        record.access();

        assert!(record.expires_at().is_none());
        assert!(record.accessed_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_default_expiry_measures_from_insertion() {
        let mut record = Record::new("key", "value");
        advance(Duration::from_millis(500)).await;

        record.apply_default_expiry(Duration::from_millis(100), true);

        assert_eq!(record.ttl(), Some(Duration::from_millis(100)));
        assert_eq!(
            record.expires_at(),
            Some(record.created_at() + Duration::from_millis(600))
        );
        assert!(record.refreshes_on_access());
        assert!(!record.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_ttl_saturates() {
        let mut record = Record::new("key", "value")
            .with_ttl(Duration::MAX)
            .refresh_on_access(true);

        assert_eq!(record.ttl(), Some(Duration::MAX));
        let expires = record.expires_at().expect("a TTL always yields an expiry");
        assert_eq!(expires, record.created_at() + FAR_FUTURE);
        assert!(record.expire_time().unwrap() > record.created_time());

        advance(Duration::from_secs(3600)).await;
        record.access();
        assert_eq!(record.expires_at(), Some(Instant::now() + FAR_FUTURE));
        assert!(!record.is_expired());

        let mut defaulted = Record::new("other", "value");
        defaulted.apply_default_expiry(Duration::MAX, false);
        assert_eq!(defaulted.expires_at(), Some(Instant::now() + FAR_FUTURE));
    }
}
