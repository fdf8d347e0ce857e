use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use shared::Result;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tache::{Counter, Entry, StoreClient};

/// Payload plus the TTL it was written with
#[derive(Clone)]
struct StoredValue {
    payload: Arc<[u8]>,
    ttl: Duration,
}

/// Expires each entry after its own TTL
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &StoredValue, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Moka-based in-process store with per-entry TTL
/// Counters live beside the cache and are never evicted
pub struct MemoryStore {
    cache: Cache<String, StoredValue>,
    counters: DashMap<String, i64>,
}

impl MemoryStore {
    /// Create a new unbounded store
    pub fn new_unbounded() -> Self {
        Self::with_builder(Cache::builder())
    }

    /// Create a new store holding at most `max_entries` entries
    pub fn new_bounded(max_entries: u64) -> Self {
        Self::with_builder(Cache::builder().max_capacity(max_entries))
    }

    fn with_builder(
        builder: moka::future::CacheBuilder<String, StoredValue, Cache<String, StoredValue>>,
    ) -> Self {
        Self {
            cache: builder.expire_after(PerEntryTtl).build(),
            counters: DashMap::new(),
        }
    }

    /// The TTL `key` was last written with, if it is still live
    pub async fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.cache.get(key).await.map(|value| value.ttl)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    async fn insert(&self, key: String, payload: Vec<u8>, ttl: Duration) {
        let value = StoredValue {
            payload: payload.into(),
            ttl,
        };
        self.cache.insert(key, value).await;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new_unbounded()
    }
}

#[async_trait]
impl Counter for MemoryStore {
    async fn incr(&self, name: &str) -> Result<i64> {
        // The entry guard holds the shard lock, so the increment is atomic.
        let mut value = self.counters.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Either doesn't exist or TTL expired
        Ok(self.cache.get(key).await.map(|value| value.payload.to_vec()))
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.insert(key.to_string(), value, ttl).await;
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.cache.invalidate(*key).await;
        }
        Ok(())
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.cache.get(*key).await.map(|value| value.payload.to_vec()));
        }
        Ok(values)
    }

    async fn pipeline_set_ex(&self, entries: Vec<Entry>) -> Result<()> {
        for entry in entries {
            self.insert(entry.key, entry.payload, entry.ttl).await;
        }
        Ok(())
    }
}

impl Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .field("counters", &self.counters.len())
            .finish()
    }
}
