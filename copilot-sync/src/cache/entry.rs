//! Cache entry type.

use chrono::{DateTime, Utc};

/// A cached value and the instant after which it is stale.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub value: T,

    /// Expiry instant; the entry is stale once `now > expires_at`.
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Returns true if the entry is stale at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
