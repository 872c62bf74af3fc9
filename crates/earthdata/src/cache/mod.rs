//! Bounded LRU response cache with TTL cleanup and durable snapshots.

pub mod persistence;
pub mod store;

pub use persistence::{CachePersister, CacheSnapshot, PERSIST_MAX_AGE_HOURS, PERSIST_MAX_ENTRIES};
pub use store::{CacheEntry, CacheStats, DataCache, DEFAULT_CAPACITY, OFFLINE_RETENTION_DAYS};
