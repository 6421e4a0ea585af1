//used parking_lot::RwLock over std::sync::RwLock as it has no poisoning and lower memory usage

use lru_time_cache::LruCache;
use parking_lot::RwLock;
use std::time::Duration;

const LOOKUP_TTL: Duration = Duration::from_secs(600);
const LOOKUP_CAPACITY: usize = 1000;

/// LruCache with time-based expiration for selector and ABI lookups.
///
/// Misses are stored as `Value::Null` so an unknown selector is not refetched
/// until the entry expires.
pub struct LookupCache {
    store: RwLock<LruCache<String, serde_json::Value>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::with_ttl(LOOKUP_TTL, LOOKUP_CAPACITY)
    }

    pub fn with_ttl(ttl: Duration, capacity: usize) -> Self {
        Self {
            store: RwLock::new(LruCache::with_expiry_duration_and_capacity(ttl, capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        // LruCache::get refreshes recency, so it needs the write lock.
        let mut store = self.store.write();
        store.get(key).cloned()
    }

    pub fn put(&self, key: String, value: serde_json::Value) {
        let mut store = self.store.write();
        store.insert(key, value);
    }
}
