use crate::domain::{COUNTER_KEY, Entry, Format};
use crate::ports::{StorageBackend, StoreClient};
use crate::serializer::Serializer;
use async_trait::async_trait;
use shared::{Error, Result};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Backend over a networked key-value store.
///
/// Entries expire server-side: every write is an atomic set-with-expiry, so a
/// read needs no separate existence check. Batched writes go out as one
/// non-transactional pipeline.
pub struct NetworkedBackend {
    client: Arc<dyn StoreClient>,
    serializer: Serializer,
    counter_key: String,
}

impl NetworkedBackend {
    pub fn new(client: Arc<dyn StoreClient>, format: Format) -> Self {
        Self {
            client,
            serializer: Serializer::new(format),
            counter_key: COUNTER_KEY.to_string(),
        }
    }

    /// Use a counter other than the shared [`COUNTER_KEY`] for `get_key`
    pub fn with_counter_key(mut self, counter_key: impl Into<String>) -> Self {
        self.counter_key = counter_key.into();
        self
    }

    pub fn counter_key(&self) -> &str {
        &self.counter_key
    }
}

#[async_trait]
impl StorageBackend for NetworkedBackend {
    fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.client.get(key).await
    }

    async fn load_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let payloads = self.client.mget(keys).await?;
        if payloads.len() != keys.len() {
            return Err(Error::StoreCommunication(format!(
                "mget returned {} values for {} keys",
                payloads.len(),
                keys.len()
            )));
        }
        Ok(payloads)
    }

    async fn store(&self, entry: Entry) -> Result<()> {
        self.client.set_ex(&entry.key, entry.payload, entry.ttl).await
    }

    async fn store_many(&self, entries: Vec<Entry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        debug!(entries = entries.len(), "dispatching write pipeline");
        self.client.pipeline_set_ex(entries).await
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.client.delete(keys).await
    }

    async fn get_key(&self) -> Result<String> {
        let id = self.client.incr(&self.counter_key).await?;
        Ok(id.to_string())
    }
}

impl Debug for NetworkedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkedBackend")
            .field("format", &self.serializer.format())
            .field("counter_key", &self.counter_key)
            .finish()
    }
}
