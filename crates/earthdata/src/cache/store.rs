use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::persistence::{
    CachePersister, CacheSnapshot, PERSIST_MAX_AGE_HOURS, PERSIST_MAX_ENTRIES,
};
use crate::models::DataResponse;

pub const DEFAULT_CAPACITY: usize = 100;

/// Offline-priority entries survive `cleanup` until this much time has
/// passed, even when the caller's `max_age` is shorter.
pub const OFFLINE_RETENTION_DAYS: i64 = 7;

/// One cached response. Entries are owned by [`DataCache`]; callers always
/// receive clones.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: DataResponse,
    #[serde(rename = "cachedAt")]
    pub cached_at: DateTime<Utc>,
    #[serde(rename = "offlinePriority")]
    pub offline_priority: bool,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        Utc::now() - self.cached_at
    }

    pub fn older_than(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }
}

/// Map and access order are only ever touched together, under the one
/// mutex, so size and recency can never drift apart.
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Front is least recently used, back is most recently used.
    order: VecDeque<String>,
    capacity: usize,
}

impl CacheInner {
    fn promote(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                self.order.remove(pos);
            }
        }
        removed
    }

    fn evict_lru(&mut self) -> Option<String> {
        let victim = self.order.pop_front()?;
        self.entries.remove(&victim);
        Some(victim)
    }
}

/// Bounded LRU cache for data responses, with TTL-based cleanup, durable
/// snapshots, and hit/miss accounting.
///
/// All mutation paths (router fetches, snapshot rehydration, cleanup)
/// funnel through the same inner lock, so every caller observes a single
/// total order of cache operations and capacity is never exceeded, not
/// even transiently.
pub struct DataCache {
    inner: Mutex<CacheInner>,
    persister: Option<CachePersister>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time diagnostics. Not used for any cache decision.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub utilization_pct: f64,
    pub estimated_bytes: usize,
    pub oldest_age_secs: Option<i64>,
    pub newest_age_secs: Option<i64>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl DataCache {
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// Build a cache backed by a snapshot file, rehydrating whatever the
    /// previous process left behind and immediately expiring anything that
    /// aged out while the process was down. A corrupt snapshot resets the
    /// cache to empty instead of failing startup.
    pub fn with_persistence(capacity: usize, persister: CachePersister) -> Self {
        let cache = Self::build(capacity, Some(persister));
        cache.rehydrate();
        cache
    }

    fn build(capacity: usize, persister: Option<CachePersister>) -> Self {
        DataCache {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
            persister,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Cache lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn rehydrate(&self) {
        let Some(persister) = &self.persister else {
            return;
        };
        match persister.load() {
            Ok(Some(snapshot)) => {
                let mut restored = 0usize;
                {
                    let mut inner = self.lock_inner();
                    // snapshot entries arrive LRU-first, so inserting in
                    // order and evicting from the front keeps the most
                    // recently used entries when capacity is smaller
                    for (key, entry) in snapshot.entries {
                        if inner.entries.contains_key(&key) {
                            continue;
                        }
                        if inner.entries.len() >= inner.capacity {
                            inner.evict_lru();
                        }
                        inner.order.push_back(key.clone());
                        inner.entries.insert(key, entry);
                        restored += 1;
                    }
                }
                info!("Rehydrated {restored} cache entries from snapshot");
                let dropped = self.cleanup(Duration::hours(PERSIST_MAX_AGE_HOURS));
                if dropped > 0 {
                    debug!("Dropped {dropped} entries that expired while the process was down");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Cache snapshot unreadable, starting empty: {e}"),
        }
    }

    /// Fetch an entry, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let found = {
            let mut inner = self.lock_inner();
            let entry = inner.entries.get(key).cloned();
            if entry.is_some() {
                inner.promote(key);
            }
            entry
        };
        match found {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {key}");
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace an entry. At capacity, exactly one least recently
    /// used entry is evicted in the same critical section as the insert.
    pub fn set(&self, key: &str, payload: DataResponse, offline_priority: bool) {
        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            cached_at: Utc::now(),
            offline_priority,
        };
        {
            let mut inner = self.lock_inner();
            if inner.entries.contains_key(key) {
                inner.entries.insert(key.to_string(), entry);
                inner.promote(key);
            } else {
                if inner.entries.len() >= inner.capacity {
                    if let Some(victim) = inner.evict_lru() {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                        debug!("Evicted least recently used cache entry {victim}");
                    }
                }
                inner.order.push_back(key.to_string());
                inner.entries.insert(key.to_string(), entry);
            }
        }
        self.persist();
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock_inner().entries.contains_key(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        let removed = self.lock_inner().remove(key).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&self) {
        {
            let mut inner = self.lock_inner();
            inner.entries.clear();
            inner.order.clear();
        }
        self.persist();
    }

    /// Remove entries older than `max_age` and return how many went.
    /// Offline-priority entries are held to the longer of `max_age` and the
    /// offline retention threshold.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let offline_limit = max_age.max(Duration::days(OFFLINE_RETENTION_DAYS));
        let removed = {
            let mut inner = self.lock_inner();
            let expired: Vec<String> = inner
                .entries
                .values()
                .filter(|entry| {
                    let limit = if entry.offline_priority {
                        offline_limit
                    } else {
                        max_age
                    };
                    entry.older_than(limit)
                })
                .map(|entry| entry.key.clone())
                .collect();
            for key in &expired {
                inner.remove(key);
            }
            expired.len()
        };
        if removed > 0 {
            info!("Cache cleanup removed {removed} entries");
            self.persist();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock_inner();
        let size = inner.entries.len();
        let estimated_bytes = inner
            .entries
            .values()
            .map(|e| serde_json::to_vec(e).map(|v| v.len()).unwrap_or(0))
            .sum();
        let now = Utc::now();
        let mut oldest: Option<i64> = None;
        let mut newest: Option<i64> = None;
        for entry in inner.entries.values() {
            let age = (now - entry.cached_at).num_seconds();
            oldest = Some(oldest.map_or(age, |o| o.max(age)));
            newest = Some(newest.map_or(age, |n| n.min(age)));
        }
        CacheStats {
            size,
            capacity: inner.capacity,
            utilization_pct: size as f64 / inner.capacity as f64 * 100.0,
            estimated_bytes,
            oldest_age_secs: oldest,
            newest_age_secs: newest,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Snapshot the most recently used entries younger than the persistence
    /// cutoff, capped in count, in LRU-first order.
    fn snapshot(&self) -> CacheSnapshot {
        let inner = self.lock_inner();
        let cutoff = Duration::hours(PERSIST_MAX_AGE_HOURS);
        let mut keep: Vec<(String, CacheEntry)> = Vec::new();
        for key in inner.order.iter().rev() {
            if keep.len() >= PERSIST_MAX_ENTRIES {
                break;
            }
            if let Some(entry) = inner.entries.get(key) {
                if !entry.older_than(cutoff) {
                    keep.push((key.clone(), entry.clone()));
                }
            }
        }
        keep.reverse();
        CacheSnapshot {
            access_order: keep.iter().map(|(k, _)| k.clone()).collect(),
            entries: keep,
            saved_at: Utc::now(),
        }
    }

    fn persist(&self) {
        let Some(persister) = &self.persister else {
            return;
        };
        let snapshot = self.snapshot();
        if let Err(e) = persister.save(&snapshot) {
            warn!("Failed to persist cache snapshot: {e}");
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &str, cached_at: DateTime<Utc>) {
        let mut inner = self.lock_inner();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.cached_at = cached_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DataFreshness, DataKind, DataResponse, QualityAssessment, ValueStatistics,
    };
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn payload(mean: f64) -> DataResponse {
        let values = vec![Some(mean)];
        DataResponse {
            kind: DataKind::SoilMoisture,
            source_id: "SMAP".to_string(),
            resolution_m: 9000,
            statistics: ValueStatistics::from_values(&values),
            values,
            quality: QualityAssessment {
                confidence: 1.0,
                issues: Vec::new(),
                is_valid: true,
            },
            educational: BTreeMap::new(),
            timestamp: Utc::now(),
            cached: false,
            freshness: DataFreshness::Live,
        }
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = DataCache::new(3);
        for key in ["k1", "k2", "k3", "k4"] {
            cache.set(key, payload(0.1), false);
        }
        assert!(!cache.has("k1"));
        assert!(cache.has("k2"));
        assert!(cache.has("k3"));
        assert!(cache.has("k4"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_get_promotes_recency() {
        let cache = DataCache::new(3);
        for key in ["k1", "k2", "k3"] {
            cache.set(key, payload(0.1), false);
        }
        // touching k1 makes k2 the least recently used
        assert!(cache.get("k1").is_some());
        cache.set("k4", payload(0.1), false);

        assert!(cache.has("k1"));
        assert!(!cache.has("k2"));
        assert!(cache.has("k3"));
        assert!(cache.has("k4"));
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let cache = DataCache::new(2);
        cache.set("k1", payload(0.1), false);
        cache.set("k2", payload(0.2), false);
        cache.set("k1", payload(0.9), false);

        assert_eq!(cache.len(), 2);
        assert!(cache.has("k2"));
        let updated = cache.get("k1").unwrap();
        assert_eq!(updated.payload.statistics.mean, Some(0.9));
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let cache = DataCache::new(3);
        for i in 0..10 {
            cache.set(&format!("k{i}"), payload(0.1), false);
            assert!(cache.len() <= 3);
        }
        let stats = cache.stats();
        assert_eq!(stats.size, 3);
        assert_eq!(stats.evictions, 7);
    }

    #[test]
    fn test_ttl_cleanup_boundary() {
        let cache = DataCache::new(10);
        cache.set("old", payload(0.1), false);
        cache.set("young", payload(0.2), false);
        cache.backdate("old", Utc::now() - Duration::minutes(61));
        cache.backdate("young", Utc::now() - Duration::minutes(59));

        let removed = cache.cleanup(Duration::minutes(60));
        assert_eq!(removed, 1);
        assert!(!cache.has("old"));
        assert!(cache.has("young"));
    }

    #[test]
    fn test_offline_priority_survives_cleanup() {
        let cache = DataCache::new(10);
        cache.set("offline", payload(0.1), true);
        cache.set("plain", payload(0.2), false);
        let two_hours_ago = Utc::now() - Duration::hours(2);
        cache.backdate("offline", two_hours_ago);
        cache.backdate("plain", two_hours_ago);

        assert_eq!(cache.cleanup(Duration::hours(1)), 1);
        assert!(cache.has("offline"));
        assert!(!cache.has("plain"));

        // past the offline retention it goes too
        cache.backdate("offline", Utc::now() - Duration::days(8));
        assert_eq!(cache.cleanup(Duration::hours(1)), 1);
        assert!(!cache.has("offline"));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = DataCache::new(5);
        cache.set("k1", payload(0.1), false);
        cache.set("k2", payload(0.2), false);

        assert!(cache.delete("k1"));
        assert!(!cache.delete("k1"));
        assert!(!cache.has("k1"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_counters() {
        let cache = DataCache::new(4);
        assert!(cache.get("absent").is_none());
        cache.set("k1", payload(0.1), false);
        assert!(cache.get("k1").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 4);
        assert!((stats.utilization_pct - 25.0).abs() < 1e-9);
        assert!(stats.estimated_bytes > 0);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        {
            let cache =
                DataCache::with_persistence(10, CachePersister::new(&path));
            cache.set("k1", payload(0.1), false);
            cache.set("k2", payload(0.2), true);
        }

        let restored = DataCache::with_persistence(10, CachePersister::new(&path));
        assert_eq!(restored.len(), 2);
        assert!(restored.has("k1"));
        let entry = restored.get("k2").unwrap();
        assert!(entry.offline_priority);
        assert_eq!(entry.payload.statistics.mean, Some(0.2));
    }

    #[test]
    fn test_corrupt_snapshot_resets_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{mangled").unwrap();

        let cache = DataCache::with_persistence(10, CachePersister::new(&path));
        assert!(cache.is_empty());

        // the cache still works and overwrites the bad file
        cache.set("k1", payload(0.3), false);
        let restored = DataCache::with_persistence(10, CachePersister::new(&path));
        assert!(restored.has("k1"));
    }

    #[test]
    fn test_snapshot_caps_entry_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = DataCache::with_persistence(100, CachePersister::new(&path));
        for i in 0..(PERSIST_MAX_ENTRIES + 5) {
            cache.set(&format!("k{i}"), payload(0.1), false);
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["entries"].as_array().unwrap().len(), PERSIST_MAX_ENTRIES);
        // the oldest keys fell off the snapshot, the newest survived
        let order: Vec<String> = doc["accessOrder"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert!(!order.contains(&"k0".to_string()));
        assert!(order.contains(&format!("k{}", PERSIST_MAX_ENTRIES + 4)));
    }

    #[test]
    fn test_rehydration_respects_capacity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        {
            let cache = DataCache::with_persistence(10, CachePersister::new(&path));
            for i in 0..5 {
                cache.set(&format!("k{i}"), payload(0.1), false);
            }
        }

        let small = DataCache::with_persistence(3, CachePersister::new(&path));
        assert_eq!(small.len(), 3);
        // the most recently used entries won
        assert!(small.has("k2"));
        assert!(small.has("k3"));
        assert!(small.has("k4"));
    }
}
