//! Concrete stores behind `tache` backends, and wiring from [`Config`].

pub mod moka_store;
pub mod redis_store;

pub use moka_store::MemoryStore;
pub use redis_store::RedisStore;

use shared::Result;
use shared::config::{BackendKind, Config};
use std::sync::Arc;
use tache::{Counter, Format, LocalBackend, NetworkedBackend, StorageBackend};
use tracing::{info, warn};

/// Build the backend selected by `config`.
///
/// A file backend still needs a shared counter for `get_key`. It uses Redis
/// when a Redis URL was configured explicitly, otherwise a process-local
/// [`MemoryStore`], whose keys are only unique within this process.
pub async fn build_backend(config: &Config) -> Result<Arc<dyn StorageBackend>> {
    let format = Format::from_name(config.format.as_deref());
    info!(
        backend = config.backend.name(),
        format = ?format,
        counter_key = %config.counter_key,
        "Building cache backend"
    );

    match config.backend {
        BackendKind::Redis => {
            let store = RedisStore::connect(&config.redis_url).await?;
            let backend = NetworkedBackend::new(Arc::new(store), format)
                .with_counter_key(config.counter_key.clone());
            Ok(Arc::new(backend))
        }
        BackendKind::File => {
            let counter: Arc<dyn Counter> = if config.redis_url_explicit {
                Arc::new(RedisStore::connect(&config.redis_url).await?)
            } else {
                warn!("No TACHE_REDIS_URL set, file backend keys are unique to this process only");
                Arc::new(MemoryStore::new_unbounded())
            };

            let mut backend =
                LocalBackend::new(counter, format).with_counter_key(config.counter_key.clone());
            if let Some(dir) = &config.cache_dir {
                backend = backend.with_root(dir.clone());
            }
            Ok(Arc::new(backend))
        }
    }
}
