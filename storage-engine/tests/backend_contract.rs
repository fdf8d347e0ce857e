//! The same cache contract, checked against every storage kind.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use storage_engine::{MemoryStore, RedisStore};
use tache::{Backend, Error, Format, LocalBackend, Lookup, NO_VALUE, NetworkedBackend, StorageBackend};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(1000);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u64,
    items: Vec<String>,
    coupon: Option<String>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn networked(format: Format) -> (Arc<MemoryStore>, NetworkedBackend) {
    init_tracing();
    let store = Arc::new(MemoryStore::new_unbounded());
    (store.clone(), NetworkedBackend::new(store, format))
}

fn local(format: Format) -> (TempDir, LocalBackend) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let backend = LocalBackend::new(Arc::new(MemoryStore::new_unbounded()), format).with_root(dir.path());
    (dir, backend)
}

async fn check_round_trip(backend: &dyn StorageBackend) {
    let order = Order {
        id: 9,
        items: vec!["tea".to_string(), "scone".to_string()],
        coupon: None,
    };
    backend.set("orders/9", &order, TIMEOUT).await.unwrap();
    assert_eq!(backend.get::<Order>("orders/9").await.unwrap(), Lookup::Hit(order));
}

async fn check_sentinel_distinctness(backend: &dyn StorageBackend) {
    assert_eq!(backend.get::<Option<Order>>("orders/never").await.unwrap(), NO_VALUE);

    backend.set("orders/none", &None::<Order>, TIMEOUT).await.unwrap();
    let lookup = backend.get::<Option<Order>>("orders/none").await.unwrap();
    assert_ne!(lookup, NO_VALUE);
    assert_eq!(lookup, Lookup::Hit(None));
}

async fn check_mget_positions(backend: &dyn StorageBackend) {
    backend.set("b", "value_b", TIMEOUT).await.unwrap();
    let lookups = backend.mget::<String>(&["a", "b", "c"]).await.unwrap();
    assert_eq!(lookups, vec![Lookup::miss(), Lookup::Hit("value_b".to_string()), Lookup::miss()]);
}

async fn check_mset_then_mget(backend: &dyn StorageBackend) {
    let mapping = HashMap::from([
        ("m/1".to_string(), Some(1u32)),
        ("m/2".to_string(), None),
        ("m/3".to_string(), Some(3)),
    ]);
    backend.mset(&mapping, TIMEOUT).await.unwrap();

    let lookups = backend.mget::<Option<u32>>(&["m/1", "m/2", "m/3", "m/4"]).await.unwrap();
    assert_eq!(
        lookups,
        vec![Lookup::Hit(Some(1)), Lookup::Hit(None), Lookup::Hit(Some(3)), Lookup::miss()]
    );
}

async fn check_idempotent_delete(backend: &dyn StorageBackend) {
    backend.set("keep", &true, TIMEOUT).await.unwrap();
    backend.delete(&["missing-key"]).await.unwrap();
    backend.delete(&["missing-key"]).await.unwrap();
    assert_eq!(backend.get::<bool>("keep").await.unwrap(), Lookup::Hit(true));

    backend.delete(&["keep"]).await.unwrap();
    assert_eq!(backend.get::<bool>("keep").await.unwrap(), NO_VALUE);
}

async fn check_get_key_unique(backend: Arc<dyn StorageBackend>) {
    let tasks = (0..50).map(|_| {
        let backend = backend.clone();
        tokio::spawn(async move { backend.get_key().await.unwrap() })
    });
    let keys: Vec<String> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    let distinct: HashSet<&String> = keys.iter().collect();
    assert_eq!(distinct.len(), 50);

    let a: i64 = backend.get_key().await.unwrap().parse().unwrap();
    let b: i64 = backend.get_key().await.unwrap().parse().unwrap();
    let c: i64 = backend.get_key().await.unwrap().parse().unwrap();
    assert!(a < b && b < c);
}

/// A reader racing a writer on one key sees the old or the new value, never a gap
async fn check_concurrent_overwrite(backend: Arc<dyn StorageBackend>) {
    for round in 0..100u32 {
        backend.set("race", &round, TIMEOUT).await.unwrap();

        let writer = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.set("race", &(round + 1000), TIMEOUT).await })
        };
        let reader = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.get::<u32>("race").await })
        };

        writer.await.unwrap().unwrap();
        let seen = reader.await.unwrap().unwrap();
        assert!(seen == Lookup::Hit(round) || seen == Lookup::Hit(round + 1000), "saw {seen:?}");
        assert_eq!(backend.get::<u32>("race").await.unwrap(), Lookup::Hit(round + 1000));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn networked_backend_satisfies_contract() {
    let (_, backend) = networked(Format::Structured);
    check_round_trip(&backend).await;
    check_sentinel_distinctness(&backend).await;
    check_mget_positions(&backend).await;
    check_mset_then_mget(&backend).await;
    check_idempotent_delete(&backend).await;
    let backend: Arc<dyn StorageBackend> = Arc::new(backend);
    check_concurrent_overwrite(backend.clone()).await;
    check_get_key_unique(backend).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn local_backend_satisfies_contract() {
    let (_dir, backend) = local(Format::Structured);
    check_round_trip(&backend).await;
    check_sentinel_distinctness(&backend).await;
    check_mget_positions(&backend).await;
    check_mset_then_mget(&backend).await;
    check_idempotent_delete(&backend).await;
    let backend: Arc<dyn StorageBackend> = Arc::new(backend);
    check_concurrent_overwrite(backend.clone()).await;
    check_get_key_unique(backend).await;
}

#[tokio::test]
async fn networked_ttl_dampening_for_nothing() {
    let (store, backend) = networked(Format::Structured);

    backend.set("n1000", &None::<String>, Duration::from_secs(1000)).await.unwrap();
    backend.set("n10", &None::<String>, Duration::from_secs(10)).await.unwrap();
    backend.set("n10000", &None::<String>, Duration::from_secs(10_000)).await.unwrap();
    backend.set("v1000", "present", Duration::from_secs(1000)).await.unwrap();

    assert_eq!(store.ttl_of("n1000").await, Some(Duration::from_secs(100)));
    assert_eq!(store.ttl_of("n10").await, Some(Duration::from_secs(1)));
    assert_eq!(store.ttl_of("n10000").await, Some(Duration::from_secs(300)));
    assert_eq!(store.ttl_of("v1000").await, Some(Duration::from_secs(1000)));
}

#[tokio::test]
async fn networked_mset_applies_policy_per_value() {
    let (store, backend) = networked(Format::Structured);
    let mapping = HashMap::from([
        ("hit".to_string(), Some("x".to_string())),
        ("empty".to_string(), None),
    ]);

    backend.mset(&mapping, Duration::from_secs(2000)).await.unwrap();

    assert_eq!(store.ttl_of("hit").await, Some(Duration::from_secs(2000)));
    assert_eq!(store.ttl_of("empty").await, Some(Duration::from_secs(200)));
}

#[tokio::test]
async fn networked_negative_entry_expires_before_positive_one() {
    let (_, backend) = networked(Format::Structured);

    backend.set("negative", &None::<u8>, Duration::from_secs(10)).await.unwrap();
    backend.set("positive", &7u8, Duration::from_secs(10)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(backend.get::<Option<u8>>("negative").await.unwrap(), NO_VALUE);
    assert_eq!(backend.get::<Option<u8>>("positive").await.unwrap(), Lookup::Hit(Some(7)));
}

#[tokio::test]
async fn backends_share_one_counter_per_store() {
    init_tracing();
    let store = Arc::new(MemoryStore::new_unbounded());
    let dir = tempfile::tempdir().unwrap();
    let networked = NetworkedBackend::new(store.clone(), Format::Structured);
    let local = LocalBackend::new(store.clone(), Format::Bytes).with_root(dir.path());

    assert_eq!(networked.get_key().await.unwrap(), "1");
    assert_eq!(local.get_key().await.unwrap(), "2");
    assert_eq!(networked.get_key().await.unwrap(), "3");

    let private = NetworkedBackend::new(store, Format::Structured).with_counter_key("jobs:id");
    assert_eq!(private.get_key().await.unwrap(), "1");
}

#[tokio::test]
async fn bytes_format_on_both_backends() {
    let payload = ByteBuf::from(vec![0u8, 1, 2, 253, 254, 255]);

    let (_, networked) = networked(Format::Bytes);
    networked.set("blob", &payload, TIMEOUT).await.unwrap();
    assert_eq!(networked.get::<ByteBuf>("blob").await.unwrap(), Lookup::Hit(payload.clone()));

    let (_dir, local) = local(Format::Bytes);
    local.set("blob", &payload, TIMEOUT).await.unwrap();
    assert_eq!(local.get::<Vec<u8>>("blob").await.unwrap(), Lookup::Hit(payload.to_vec()));

    let result = local.set("not-bytes", &Order { id: 1, items: vec![], coupon: None }, TIMEOUT).await;
    assert!(matches!(result, Err(Error::Serialization(_))));
}

#[tokio::test]
async fn malformed_payload_is_not_a_miss() {
    let (store, backend) = networked(Format::Structured);
    tache::StoreClient::set_ex(store.as_ref(), "broken", b"{not json".to_vec(), TIMEOUT)
        .await
        .unwrap();

    let result = backend.get::<Order>("broken").await;
    assert!(matches!(result, Err(Error::Serialization(_))));
}

/// Needs a live server: `TACHE_REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn redis_backend_satisfies_contract() {
    init_tracing();
    let url = std::env::var("TACHE_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let store = RedisStore::connect(&url).await.unwrap();
    let backend = NetworkedBackend::new(Arc::new(store), Format::Structured);

    backend
        .delete(&["orders/9", "orders/never", "orders/none", "a", "b", "c", "m/1", "m/2", "m/3", "m/4", "keep", "race"])
        .await
        .unwrap();

    check_round_trip(&backend).await;
    check_sentinel_distinctness(&backend).await;
    check_mget_positions(&backend).await;
    check_mset_then_mget(&backend).await;
    check_idempotent_delete(&backend).await;
    let backend: Arc<dyn StorageBackend> = Arc::new(backend);
    check_concurrent_overwrite(backend.clone()).await;
    check_get_key_unique(backend).await;
}
