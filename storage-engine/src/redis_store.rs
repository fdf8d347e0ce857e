//! Redis store client.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use shared::{Error, Result};
use std::fmt::Debug;
use std::time::Duration;
use tache::{Counter, Entry, StoreClient};
use tracing::debug;

/// Redis client over one multiplexed connection.
///
/// The connection is cloned per command; clones share the same socket, so
/// concurrent callers need no extra locking.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Wrap an already-open connection.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Open a client for `url` and connect.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(communication)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(communication)?;

        debug!(url = url, "Connected to Redis");
        Ok(Self::new(conn))
    }

    fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

fn communication(err: redis::RedisError) -> Error {
    Error::StoreCommunication(err.to_string())
}

/// Whole seconds for SETEX, rounding sub-second remainders up.
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs()
        .saturating_add(u64::from(ttl.subsec_nanos() > 0))
}

#[async_trait]
impl Counter for RedisStore {
    async fn incr(&self, name: &str) -> Result<i64> {
        let mut conn = self.connection();
        conn.incr(name, 1).await.map_err(communication)
    }
}

#[async_trait]
impl StoreClient for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection();
        conn.get(key).await.map_err(communication)
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.connection();
        conn.set_ex(key, value, expiry_secs(ttl))
            .await
            .map_err(communication)
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        let mut conn = self.connection();
        conn.del(keys).await.map_err(communication)
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut conn = self.connection();
        // Explicit MGET so a single key still yields a one-element array.
        redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(communication)
    }

    async fn pipeline_set_ex(&self, entries: Vec<Entry>) -> Result<()> {
        let mut conn = self.connection();
        let mut pipe = redis::pipe();
        for entry in entries {
            pipe.set_ex(entry.key, entry.payload, expiry_secs(entry.ttl))
                .ignore();
        }
        pipe.query_async(&mut conn).await.map_err(communication)
    }
}

impl Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("conn", &"<redis::aio::MultiplexedConnection>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_secs_rounds_up() {
        assert_eq!(expiry_secs(Duration::from_secs(100)), 100);
        assert_eq!(expiry_secs(Duration::from_millis(1500)), 2);
        assert_eq!(expiry_secs(Duration::from_millis(1)), 1);
        assert_eq!(expiry_secs(Duration::ZERO), 0);
    }

    #[test]
    fn test_expiry_secs_saturates() {
        assert_eq!(expiry_secs(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_is_a_communication_error() {
        let result = RedisStore::connect("redis://127.0.0.1:1").await;
        assert!(matches!(result, Err(Error::StoreCommunication(_))));
    }

    /// Needs a live server: `TACHE_REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_set_ex_and_pipeline_apply_ttls() {
        let url = std::env::var("TACHE_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let store = RedisStore::connect(&url).await.unwrap();
        store.delete(&["ttl:single", "ttl:a", "ttl:b"]).await.unwrap();

        store
            .set_ex("ttl:single", b"1".to_vec(), Duration::from_millis(1500))
            .await
            .unwrap();
        store
            .pipeline_set_ex(vec![
                Entry::new("ttl:a", b"a".to_vec(), Duration::from_secs(100)),
                Entry::new("ttl:b", b"b".to_vec(), Duration::from_secs(1000)),
            ])
            .await
            .unwrap();

        let mut conn = store.connection();
        let single: i64 = conn.ttl("ttl:single").await.unwrap();
        let a: i64 = conn.ttl("ttl:a").await.unwrap();
        let b: i64 = conn.ttl("ttl:b").await.unwrap();
        assert!((1..=2).contains(&single));
        assert!((99..=100).contains(&a));
        assert!((999..=1000).contains(&b));

        let values = store.mget(&["ttl:a", "ttl:missing", "ttl:b"]).await.unwrap();
        assert_eq!(values, vec![Some(b"a".to_vec()), None, Some(b"b".to_vec())]);
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_communication_error() {
        let result = RedisStore::connect("not a url").await;
        assert!(matches!(result, Err(Error::StoreCommunication(_))));
    }
}
