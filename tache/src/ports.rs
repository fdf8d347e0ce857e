#![deny(clippy::all)]

use crate::domain::Entry;
use crate::serializer::Serializer;
use async_trait::async_trait;
use shared::Result;
use std::time::Duration;

// Ports are the pluggable extension points for the stores behind a backend

/// Atomic increment-by-name, delegated to the store's native primitive
#[async_trait]
pub trait Counter: Send + Sync + 'static {
    /// Increment the counter `name` by one and return the new value
    async fn incr(&self, name: &str) -> Result<i64>;
}

/// An already-connected key-value store client
///
/// Implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait StoreClient: Counter {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    /// Remove every key given; absent keys are ignored
    async fn delete(&self, keys: &[&str]) -> Result<()>;
    /// One slot per key, in key order
    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>>;
    /// Dispatch all writes as one non-transactional batch
    async fn pipeline_set_ex(&self, entries: Vec<Entry>) -> Result<()>;
}

/// Byte-level storage shared by every backend kind
///
/// Typed reads and writes, and the negative-caching policy, are layered on
/// top of this by [`crate::backend::Backend`].
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    fn serializer(&self) -> &Serializer;
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn load_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>>;
    async fn store(&self, entry: Entry) -> Result<()>;
    async fn store_many(&self, entries: Vec<Entry>) -> Result<()>;
    async fn delete(&self, keys: &[&str]) -> Result<()>;
    /// A fresh token from the shared counter, strictly increasing
    async fn get_key(&self) -> Result<String>;
}
