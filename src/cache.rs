//! TTL-aware response caching.
//!
//! One cache instance belongs to one client. Keys are lowercased before
//! storage so case-variant lookups cannot be poisoned into distinct entries.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::response::Response;

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching.
    pub enabled: bool,
    /// Maximum cache entries (0 = unlimited).
    pub max_entries: usize,
    /// Default TTL when the response does not specify one.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            max_entries: 1000,
            default_ttl: Duration::from_secs(300),
        }
    }
}

/// TTL-bounded response cache.
pub trait Cache: Send + Sync {
    /// Look up a response; expired entries are a miss.
    fn get(&self, key: &str) -> Option<Response>;
    /// Store a response under the effective TTL.
    fn set(&self, key: &str, resp: Response, ttl: Duration);
    /// Remove a cached response.
    fn delete(&self, key: &str);
    /// Remove all cached responses.
    fn clear(&self);
}

struct CacheEntry {
    response: Response,
    expires_at: Instant,
}

/// In-memory cache implementation.
///
/// Readers share the lock; writers are serialized. No LRU: when the entry
/// count reaches the cap, expired entries are swept before inserting.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
    default_ttl: Duration,
}

impl MemoryCache {
    /// Create a new in-memory cache.
    pub fn new(config: &CacheConfig) -> MemoryCache {
        MemoryCache {
            entries: RwLock::new(HashMap::new()),
            max_entries: config.max_entries,
            default_ttl: config.default_ttl,
        }
    }

    /// Effective TTL: min of the response TTL and the default when both are
    /// positive, else whichever is positive, else the default.
    fn effective_ttl(&self, ttl: Duration) -> Duration {
        if ttl.is_zero() {
            self.default_ttl
        } else if !self.default_ttl.is_zero() && self.default_ttl < ttl {
            self.default_ttl
        } else {
            ttl
        }
    }

    /// Remove expired entries. Caller holds the write lock.
    fn evict_expired(entries: &mut HashMap<String, CacheEntry>) {
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Response> {
        let normalized = normalize_key(key);
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(&normalized) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.response.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: evict opportunistically outside the read lock.
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get(&normalized) {
            if entry.expires_at <= Instant::now() {
                entries.remove(&normalized);
            }
        }
        None
    }

    fn set(&self, key: &str, resp: Response, ttl: Duration) {
        let ttl = self.effective_ttl(ttl);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if self.max_entries > 0 && entries.len() >= self.max_entries {
            Self::evict_expired(&mut entries);
        }
        entries.insert(
            normalize_key(key),
            CacheEntry {
                response: resp,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn delete(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&normalize_key(key));
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

/// No-op cache for when caching is disabled.
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<Response> {
        None
    }
    fn set(&self, _key: &str, _resp: Response, _ttl: Duration) {}
    fn delete(&self, _key: &str) {}
    fn clear(&self) {}
}

/// Normalize a cache key: lowercase to defeat case-variant poisoning.
fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}

/// Build the request fingerprint used as a cache key.
pub(crate) fn build_cache_key(
    operation: &str,
    resource: &str,
    key: &str,
    namespace: &str,
    version: &str,
) -> String {
    normalize_key(&[operation, resource, key, namespace, version].join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(status: &str) -> Response {
        Response {
            version: "rdb1".into(),
            status: status.into(),
            ..Default::default()
        }
    }

    fn small_cache(max_entries: usize) -> MemoryCache {
        MemoryCache::new(&CacheConfig {
            enabled: true,
            max_entries,
            default_ttl: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_set_get_round_trip() {
        let cache = small_cache(10);
        cache.set("k", resp("ok"), Duration::from_secs(30));
        assert_eq!(cache.get("k").unwrap().status, "ok");
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache = small_cache(10);
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn test_expiry() {
        let cache = small_cache(10);
        cache.set("k", resp("ok"), Duration::from_millis(20));
        assert!(cache.get("k").is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_key_normalization() {
        let cache = small_cache(10);
        cache.set("FOO", resp("ok"), Duration::from_secs(30));
        assert!(cache.get("foo").is_some());
        assert!(cache.get("FOO").is_some());
        assert!(cache.get("Foo").is_some());
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = small_cache(10);
        cache.set("a", resp("ok"), Duration::from_secs(30));
        cache.set("b", resp("ok"), Duration::from_secs(30));

        cache.delete("A");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());

        cache.clear();
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_effective_ttl_min_rule() {
        let cache = small_cache(10);
        // Response TTL shorter than default: response wins.
        assert_eq!(
            cache.effective_ttl(Duration::from_secs(5)),
            Duration::from_secs(5)
        );
        // Response TTL longer than default: default wins.
        assert_eq!(
            cache.effective_ttl(Duration::from_secs(600)),
            Duration::from_secs(60)
        );
        // Zero response TTL: default.
        assert_eq!(cache.effective_ttl(Duration::ZERO), Duration::from_secs(60));
    }

    #[test]
    fn test_capacity_sweeps_expired() {
        let cache = small_cache(2);
        cache.set("old1", resp("ok"), Duration::from_millis(10));
        cache.set("old2", resp("ok"), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));

        cache.set("fresh", resp("ok"), Duration::from_secs(30));
        assert!(cache.get("fresh").is_some());
        assert!(cache.get("old1").is_none());
        assert!(cache.get("old2").is_none());
    }

    #[test]
    fn test_noop_cache() {
        let cache = NoopCache;
        cache.set("k", resp("ok"), Duration::from_secs(30));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_build_cache_key() {
        assert_eq!(
            build_cache_key("get", "Weather", "Quebec", "MyApp", "v1"),
            "get.weather.quebec.myapp.v1"
        );
        assert_eq!(
            build_cache_key("get", "weather", "", "", "v1"),
            "get.weather...v1"
        );
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(small_cache(100));
        let mut handles = Vec::new();
        for t in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("key-{}", i % 10);
                    cache.set(&key, resp("ok"), Duration::from_secs(30));
                    let _ = cache.get(&key);
                    if t % 2 == 0 {
                        cache.delete(&key);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
