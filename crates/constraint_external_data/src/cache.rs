// SPDX-License-Identifier: Apache-2.0

//! The process-wide, TTL-bounded response cache keyed by `(provider, key)`.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::model::CacheEntry;

/// A `(providerName, key)` keyed cache with a single TTL for all entries.
///
/// Guarded by a single `RwLock`: lookups (the common case, many concurrent
/// queries) take a read lock; inserts after a remote fetch take a write
/// lock. This mirrors the reader/writer discipline the rest of the
/// framework uses around its registries.
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
}

impl ResponseCache {
    /// Creates an empty cache with the given time-to-live.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up a single key, returning `None` on a miss or an expired
    /// entry. Expired entries are treated as misses, not evicted eagerly;
    /// they are overwritten on the next successful fetch.
    #[must_use]
    pub fn get(&self, provider: &str, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().expect("response cache lock poisoned");
        let entry = entries.get(&(provider.to_owned(), key.to_owned()))?;
        if entry.received_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.clone())
    }

    /// Inserts or replaces the entry for `(provider, key)`.
    pub fn put(&self, provider: &str, key: &str, entry: CacheEntry) {
        let mut entries = self.entries.write().expect("response cache lock poisoned");
        let _ = entries.insert((provider.to_owned(), key.to_owned()), entry);
    }

    /// Splits `keys` into cache hits (with their entries) and misses that
    /// must be fetched from the provider.
    #[must_use]
    pub fn partition<'a>(
        &self,
        provider: &str,
        keys: &'a [String],
    ) -> (Vec<(&'a str, CacheEntry)>, Vec<&'a str>) {
        let mut hits = Vec::new();
        let mut misses = Vec::new();
        for key in keys {
            match self.get(provider, key) {
                Some(entry) => hits.push((key.as_str(), entry)),
                None => misses.push(key.as_str()),
            }
        }
        (hits, misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_cache() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        assert!(cache.get("p", "k1").is_none());
    }

    #[test]
    fn hit_after_put() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put(
            "p",
            "k1",
            CacheEntry {
                value: Some(serde_json::json!("v1")),
                error: None,
                received_at: Instant::now(),
                idempotent: true,
            },
        );
        assert!(cache.get("p", "k1").is_some());
        assert!(cache.get("p", "k2").is_none());
    }

    #[test]
    fn expired_entries_are_treated_as_misses() {
        let cache = ResponseCache::new(Duration::from_millis(0));
        cache.put(
            "p",
            "k1",
            CacheEntry {
                value: Some(serde_json::json!("v1")),
                error: None,
                received_at: Instant::now() - Duration::from_secs(1),
                idempotent: true,
            },
        );
        assert!(cache.get("p", "k1").is_none());
    }

    #[test]
    fn partition_splits_hits_and_misses() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put(
            "p",
            "k1",
            CacheEntry {
                value: Some(serde_json::json!("v1")),
                error: None,
                received_at: Instant::now(),
                idempotent: false,
            },
        );
        let keys = vec!["k1".to_owned(), "k2".to_owned()];
        let (hits, misses) = cache.partition("p", &keys);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "k1");
        assert_eq!(misses, vec!["k2"]);
    }
}
