//! In-memory LRU cache fronting the registry, with TTL expiry and hit
//! rate metrics.

use crate::record::LocationRecord;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct Entry {
    record: LocationRecord,
    inserted_at: Instant,
}

/// Point-in-time counters for the registry cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheMetrics {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL-bounded LRU cache. Default capacity 1,000,000 entries, 5-minute
/// TTL, matching the registry's default configuration.
pub struct RegistryCache {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl RegistryCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<LocationRecord> {
        let mut guard = self.inner.lock();
        if let Some(entry) = guard.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("objectio_registry_cache_hits_total").increment(1);
                return Some(entry.record.clone());
            }
            guard.pop(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("objectio_registry_cache_evictions_total").increment(1);
            tracing::debug!(key, "registry cache entry expired");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("objectio_registry_cache_misses_total").increment(1);
        None
    }

    pub fn put(&self, key: String, record: LocationRecord) {
        let mut guard = self.inner.lock();
        if guard.put(
            key,
            Entry {
                record,
                inserted_at: Instant::now(),
            },
        ).is_some()
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("objectio_registry_cache_evictions_total").increment(1);
        }
        metrics::gauge!("objectio_registry_cache_entries").set(guard.len() as f64);
    }

    pub fn invalidate(&self, key: &str) {
        let mut guard = self.inner.lock();
        if guard.pop(key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("objectio_registry_cache_evictions_total").increment(1);
        }
        metrics::gauge!("objectio_registry_cache_entries").set(guard.len() as f64);
    }

    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.inner.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objectio_common::VersionId;

    fn rec() -> LocationRecord {
        LocationRecord {
            bucket: "b".into(),
            key: "k".into(),
            version_id: VersionId::new(),
            pool_index: 0,
            set_index: 1,
            disk_count: 6,
            disk_indices: vec![0, 1, 2, 3, 4, 5],
            generation: 3,
            mod_time_unix_ms: 0,
            size: 10,
        }
    }

    #[test]
    fn test_hit_then_invalidate_miss() {
        let cache = RegistryCache::new(10, Duration::from_secs(300));
        cache.put("x".into(), rec());
        assert!(cache.get("x").is_some());
        cache.invalidate("x");
        assert!(cache.get("x").is_none());
        let m = cache.metrics();
        assert_eq!(m.hits, 1);
        assert_eq!(m.misses, 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = RegistryCache::new(10, Duration::from_millis(10));
        cache.put("x".into(), rec());
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("x").is_none());
    }
}
