//! The cache contract shared by every storage kind.
//!
//! [`Backend`] is implemented for every [`StorageBackend`] (trait objects
//! included), so the sentinel handling and the negative-caching TTL below are
//! written once and cannot drift between the networked and local stores.

use crate::domain::{Entry, Lookup};
use crate::ports::StorageBackend;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::Result;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const NEGATIVE_TTL_DIVISOR: u128 = 10;
const NEGATIVE_TTL_MIN_SECS: u128 = 1;
const NEGATIVE_TTL_MAX_SECS: u128 = 300;

/// TTL for a cached "nothing": a tenth of `timeout`, kept within 1..=300
/// seconds and truncated to whole seconds.
///
/// Truncation rather than round-to-nearest: a 15s timeout yields 1s, not 2s.
pub fn negative_ttl(timeout: Duration) -> Duration {
    let tenth_millis = timeout.as_millis() / NEGATIVE_TTL_DIVISOR;
    let secs = (tenth_millis / 1000).clamp(NEGATIVE_TTL_MIN_SECS, NEGATIVE_TTL_MAX_SECS);
    Duration::from_secs(secs as u64)
}

/// Encode `value` for `key`, shortening the TTL when the value is "nothing"
fn prepare_entry<B, T>(backend: &B, key: &str, value: &T, timeout: Duration) -> Result<Entry>
where
    B: StorageBackend + ?Sized,
    T: Serialize + ?Sized,
{
    let (payload, nothing) = backend.serializer().encode_marked(value)?;
    let ttl = if nothing { negative_ttl(timeout) } else { timeout };
    Ok(Entry::new(key, payload, ttl))
}

/// Typed cache operations over any [`StorageBackend`]
#[async_trait]
pub trait Backend: StorageBackend {
    /// Fetch and decode `key`; [`Lookup::Miss`] when nothing is stored
    async fn get<T>(&self, key: &str) -> Result<Lookup<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.load(key).await? {
            Some(payload) => {
                debug!(key = key, "cache hit");
                Ok(Lookup::Hit(self.serializer().decode(&payload)?))
            }
            None => {
                debug!(key = key, "cache miss");
                Ok(Lookup::miss())
            }
        }
    }

    /// Encode and store `value`; "nothing" values get [`negative_ttl`]
    async fn set<T>(&self, key: &str, value: &T, timeout: Duration) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let entry = prepare_entry(self, key, value, timeout)?;
        debug!(key = key, ttl_secs = entry.ttl.as_secs(), "cache set");
        self.store(entry).await
    }

    /// One lookup per key, in key order
    async fn mget<T>(&self, keys: &[&str]) -> Result<Vec<Lookup<T>>>
    where
        T: DeserializeOwned + Send,
    {
        let payloads = self.load_many(keys).await?;
        let serializer = self.serializer();
        let lookups = payloads
            .into_iter()
            .map(|payload| match payload {
                Some(payload) => serializer.decode(&payload).map(Lookup::Hit),
                None => Ok(Lookup::miss()),
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            keys = keys.len(),
            hits = lookups.iter().filter(|lookup| lookup.is_hit()).count(),
            "cache mget"
        );
        Ok(lookups)
    }

    /// Store every entry in one batch; the TTL policy applies per value.
    ///
    /// The batch is not atomic: a failure part-way can leave some entries written.
    async fn mset<T>(&self, mapping: &HashMap<String, T>, timeout: Duration) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let entries = mapping
            .iter()
            .map(|(key, value)| prepare_entry(self, key, value, timeout))
            .collect::<Result<Vec<_>>>()?;
        debug!(entries = entries.len(), "cache mset");
        self.store_many(entries).await
    }
}

impl<B: StorageBackend + ?Sized> Backend for B {}
