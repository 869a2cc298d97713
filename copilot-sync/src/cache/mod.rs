//! Time-bounded in-memory cache.
//!
//! Entries expire lazily: nothing sweeps the map, an expired entry is simply
//! dropped the next time it is read. The cache lives as long as its owner;
//! nothing is persisted.

mod entry;

pub use entry::CacheEntry;

use crate::clock::{Clock, SystemClock};
use chrono::TimeDelta;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

/// Default time-to-live for cached values (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A string-keyed cache whose entries expire after a fixed TTL.
pub struct TtlCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    /// Creates a cache using the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    /// Returns the cached value for `key` if present and not expired.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                trace!(key, "Cache entry expired");
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: impl Into<String>, value: T) {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        self.lock()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Removes the entry for `key`, returning true if one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including ones that expired but were not read yet.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        // The map holds no invariants a panicking writer could break.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache_with_clock() -> (TtlCache<Vec<String>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = TtlCache::with_clock(DEFAULT_TTL, clock.clone());
        (cache, clock)
    }

    #[test]
    fn returns_value_within_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.insert("listing:awesome", vec!["a".to_string()]);

        clock.advance(TimeDelta::minutes(4));
        assert_eq!(cache.get("listing:awesome"), Some(vec!["a".to_string()]));
    }

    #[test]
    fn expires_lazily_after_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.insert("listing:awesome", vec!["a".to_string()]);

        clock.advance(TimeDelta::minutes(5) + TimeDelta::seconds(1));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("listing:awesome"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn entry_at_exact_expiry_is_still_valid() {
        let (cache, clock) = cache_with_clock();
        cache.insert("key", vec![]);

        clock.advance(TimeDelta::minutes(5));
        assert!(cache.get("key").is_some());
    }

    #[test]
    fn invalidate_and_clear() {
        let (cache, _clock) = cache_with_clock();
        cache.insert("a", vec![]);
        cache.insert("b", vec![]);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
