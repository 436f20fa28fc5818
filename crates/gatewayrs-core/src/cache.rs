//! Cache primitive (component C).
//!
//! A keyed map with optional time-bounded expiry, used by both the upstream
//! session's per-peer lists and the aggregation services' per-session union
//! caches.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// A concurrent keyed cache. Without a TTL, entries only ever expire via
/// explicit `invalidate`. With a TTL, a `get` past expiry behaves as a miss.
pub struct Cache<K, V> {
    entries: DashMap<K, Entry<V>>,
    ttl: Option<Duration>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Cache {
            entries: DashMap::new(),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Cache {
            entries: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    /// Return the cached value for `key`, if present and unexpired.
    pub fn get(&self, key: &K) -> Option<V> {
        let hit = self.entries.get(key)?;
        if let Some(expires_at) = hit.expires_at {
            if Instant::now() >= expires_at {
                drop(hit);
                self.entries.remove(key);
                return None;
            }
        }
        Some(hit.value.clone())
    }

    /// Unconditionally store `value` under `key`, refreshing the TTL clock.
    pub fn put(&self, key: K, value: V) {
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key, Entry { value, expires_at });
    }

    /// Idempotent: drops the entry for `key`, if any.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let cache: Cache<String, i32> = Cache::new();
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn invalidate_is_idempotent() {
        let cache: Cache<String, i32> = Cache::new();
        cache.put("a".to_string(), 1);
        cache.invalidate(&"a".to_string());
        cache.invalidate(&"a".to_string());
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn next_list_after_invalidate_is_a_miss() {
        let cache: Cache<String, i32> = Cache::new();
        cache.put("session-1".to_string(), 42);
        assert!(cache.contains(&"session-1".to_string()));
        cache.invalidate(&"session-1".to_string());
        assert!(!cache.contains(&"session-1".to_string()));
    }

    #[test]
    fn ttl_expiry() {
        let cache: Cache<String, i32> = Cache::with_ttl(Duration::from_millis(1));
        cache.put("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a".to_string()), None);
    }
}
