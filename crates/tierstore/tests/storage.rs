// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the tiered read path and the write-behind write paths.

use std::time::Duration;

use serde_json::{Map, Value, json};
use tierstore_tier::testing::{CacheOp, MockCache};
use tierstore::{
    BaseStorage, EntityKey, EntityRecord, Error, FieldCondition, Gid, InProcessBus, InvalidationMessage, KeyDomain, MemoryStore,
    MessageKind, Payload, RelationalStore, Storage, Subscription,
};
use tierstore_memory::LocalCache;

type TestResult = Result<(), Error>;

type TestStorage = BaseStorage<Value, MockCache<Value>, MockCache<Value>, MemoryStore<Value>, InProcessBus>;

struct Harness {
    storage: TestStorage,
    local: MockCache<Value>,
    remote: MockCache<Value>,
    store: MemoryStore<Value>,
    cache_topic: Subscription,
    store_topic: Subscription,
}

fn harness() -> Harness {
    let local = MockCache::named("local");
    let remote = MockCache::named("remote");
    let store = MemoryStore::new();
    let bus = InProcessBus::new();
    let storage = BaseStorage::builder(local.clone(), remote.clone(), store.clone(), bus.clone())
        .build()
        .unwrap();

    Harness {
        storage,
        local,
        remote,
        store,
        cache_topic: bus.subscribe("midCache").unwrap(),
        store_topic: bus.subscribe("orm").unwrap(),
    }
}

fn alice() -> EntityRecord<Value> {
    EntityRecord::new(json!({"name": "Alice", "age": 30}), Gid::new(1))
}

async fn persist(store: &MemoryStore<Value>, record: &EntityRecord<Value>) {
    store.create(&record.key(KeyDomain::Integer), record).await.unwrap();
}

#[tokio::test]
async fn filter_with_every_tier_empty_is_empty() -> TestResult {
    let h = harness();

    let found = h.storage.filter(Gid::new(1), &FieldCondition::like("name", "A")).await?;

    assert!(found.is_empty());
    assert!(found.first().is_err());
    Ok(())
}

#[tokio::test]
async fn filter_falls_through_to_store() -> TestResult {
    let h = harness();
    persist(&h.store, &alice()).await;

    let found = h.storage.filter(Gid::new(1), &FieldCondition::like("name", "Ali")).await?;

    assert_eq!(found.count(), 1);
    assert_eq!(found.first().unwrap()["name"], "Alice");
    assert_eq!(h.local.operations(), vec![CacheOp::Get(EntityKey::Integer(1))]);
    assert_eq!(h.remote.operations(), vec![CacheOp::Get(EntityKey::Integer(1))]);

    // Lower-tier hits are not copied upward.
    assert_eq!(h.local.entry_count(), 0);
    assert_eq!(h.remote.entry_count(), 0);
    Ok(())
}

#[tokio::test]
async fn filter_answers_from_local_cache() -> TestResult {
    let h = harness();
    h.local.seed(1_i64, json!({"name": "Alice", "age": 30}));

    let found = h.storage.filter(Gid::new(1), &FieldCondition::exact("age", 30)).await?;

    assert_eq!(found.count(), 1);
    assert!(h.remote.operations().is_empty());
    Ok(())
}

#[tokio::test]
async fn filter_answers_from_remote_cache() -> TestResult {
    let h = harness();
    h.remote.seed(1_i64, json!({"name": "Alice", "age": 30}));

    let found = h.storage.filter(Gid::new(1), &FieldCondition::range("age", 18, 65)).await?;

    assert_eq!(found.get_all(), &[json!({"name": "Alice", "age": 30})]);
    assert_eq!(h.local.operations().len(), 1);
    Ok(())
}

#[tokio::test]
async fn filter_skips_cached_value_that_does_not_match() -> TestResult {
    let h = harness();
    h.local.seed(1_i64, json!({"name": "Bob", "age": 40}));
    h.remote.seed(1_i64, json!({"name": "Bob", "age": 40}));
    persist(&h.store, &alice()).await;
    persist(&h.store, &EntityRecord::new(json!({"name": "Alicia", "age": 22}), Gid::new(2))).await;

    let found = h.storage.filter(Gid::new(1), &FieldCondition::like("name", "Ali")).await?;

    // The store is queried by condition, not by key.
    assert_eq!(found.count(), 2);
    assert_eq!(found.last().unwrap()["name"], "Alicia");
    Ok(())
}

#[tokio::test]
async fn filter_with_text_keys() -> TestResult {
    let local = MockCache::<Value>::named("local");
    let bus = InProcessBus::new();
    let storage = BaseStorage::builder(local.clone(), MockCache::named("remote"), MemoryStore::new(), bus)
        .key_domain(KeyDomain::Text)
        .build()?;

    let key = EntityKey::Text(Gid::new(42).as_text());
    assert_eq!(storage.key_for(Gid::new(42)), key);
    local.seed(key, json!({"name": "Zed"}));

    let found = storage.filter(Gid::new(42), &FieldCondition::exact("name", "Zed")).await?;
    assert_eq!(found.count(), 1);
    Ok(())
}

#[tokio::test]
async fn filter_propagates_closed_local_cache() -> TestResult {
    let local = LocalCache::<Value>::builder().capacity(8).build()?;
    let remote = MockCache::<Value>::named("remote");
    let storage = BaseStorage::builder(local, remote.clone(), MemoryStore::new(), InProcessBus::new()).build()?;
    storage.local().stop().await;

    let err = storage.filter(Gid::new(1), &FieldCondition::like("name", "A")).await.unwrap_err();

    assert!(err.is_closed());
    assert!(remote.operations().is_empty(), "a closed cache must not fall through");
    Ok(())
}

#[tokio::test]
async fn filter_propagates_remote_failure() {
    let h = harness();
    persist(&h.store, &alice()).await;
    h.remote.fail_when(|op| matches!(op, CacheOp::Get(_)));

    let err = h.storage.filter(Gid::new(1), &FieldCondition::like("name", "A")).await.unwrap_err();

    assert!(matches!(err, Error::RemoteCache(_)));
}

#[tokio::test]
async fn filter_over_bounded_local_cache() -> TestResult {
    let local = LocalCache::<Value>::builder().capacity(2).build()?;
    let store = MemoryStore::new();
    let storage = BaseStorage::builder(local, MockCache::named("remote"), store.clone(), InProcessBus::new()).build()?;
    persist(&store, &alice()).await;

    tierstore::Cache::set(storage.local(), &EntityKey::Integer(1), json!({"name": "Cached"}), Duration::from_secs(60)).await?;
    tierstore::Cache::set(storage.local(), &EntityKey::Integer(2), json!({"name": "Two"}), Duration::from_secs(60)).await?;
    tierstore::Cache::set(storage.local(), &EntityKey::Integer(3), json!({"name": "Three"}), Duration::from_secs(60)).await?;

    // Key 1 was evicted, so the read reaches the store.
    let found = storage.filter(Gid::new(1), &FieldCondition::like("name", "")).await?;
    assert_eq!(found.first().unwrap()["name"], "Alice");

    storage.local().stop().await;
    Ok(())
}

#[tokio::test]
async fn store_only_publishes_create() -> TestResult {
    let mut h = harness();

    h.storage.store(&alice()).await?;

    let published = h.cache_topic.drain::<Value>()?;
    assert_eq!(published, vec![InvalidationMessage::create(alice())]);
    assert!(h.store_topic.drain::<Value>()?.is_empty());
    assert!(h.local.operations().is_empty());
    assert!(h.remote.operations().is_empty());
    assert!(h.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn update_invalidates_both_caches() -> TestResult {
    let mut h = harness();
    let old = alice();
    let new = EntityRecord::new(json!({"name": "Alice", "age": 31}), Gid::new(1));
    h.local.seed(1_i64, old.value().clone());
    h.remote.seed(1_i64, old.value().clone());

    h.storage.update(&old, &new).await?;

    assert!(!h.local.contains_key(&EntityKey::Integer(1)));
    assert!(!h.remote.contains_key(&EntityKey::Integer(1)));

    let cache_messages = h.cache_topic.drain::<Value>()?;
    assert_eq!(cache_messages, vec![InvalidationMessage::delete(old.clone())]);

    let store_messages = h.store_topic.drain::<Value>()?;
    assert_eq!(store_messages.len(), 1);
    let (kind, payload) = store_messages.into_iter().next().unwrap().into_parts();
    assert_eq!(kind, MessageKind::Update);
    assert_eq!(payload, Payload::Pair(old, new));
    Ok(())
}

#[tokio::test]
async fn update_of_locally_cached_entity_skips_cache_topic() -> TestResult {
    let mut h = harness();
    h.local.seed(1_i64, alice().value().clone());

    h.storage.update(&alice(), &alice()).await?;

    assert_eq!(h.local.entry_count(), 0);
    assert!(h.cache_topic.drain::<Value>()?.is_empty());
    assert_eq!(h.store_topic.drain::<Value>()?.len(), 1);
    assert!(!h.remote.operations().contains(&CacheOp::Delete(EntityKey::Integer(1))));
    Ok(())
}

#[tokio::test]
async fn update_of_uncached_entity_still_publishes() -> TestResult {
    let mut h = harness();

    h.storage.update(&alice(), &alice()).await?;

    assert_eq!(
        h.local.operations(),
        vec![CacheOp::Exists(EntityKey::Integer(1))],
        "nothing to delete locally"
    );
    assert_eq!(h.store_topic.drain::<Value>()?[0].kind(), MessageKind::Update);
    Ok(())
}

#[tokio::test]
async fn update_stops_when_remote_invalidation_fails() {
    let mut h = harness();
    h.remote.seed(1_i64, alice().value().clone());
    h.remote.fail_when(|op| matches!(op, CacheOp::Delete(_)));

    let err = h.storage.update(&alice(), &alice()).await.unwrap_err();

    assert!(matches!(err, Error::RemoteCache(_)));
    assert!(h.store_topic.drain::<Value>().unwrap().is_empty());
}

#[tokio::test]
async fn delete_publishes_to_both_topics() -> TestResult {
    let mut h = harness();
    h.local.seed(1_i64, alice().value().clone());

    h.storage.delete(&alice()).await?;

    assert_eq!(h.local.entry_count(), 0);
    assert_eq!(h.cache_topic.drain::<Value>()?, vec![InvalidationMessage::delete(alice())]);
    assert_eq!(h.store_topic.drain::<Value>()?, vec![InvalidationMessage::delete(alice())]);
    Ok(())
}

#[tokio::test]
async fn delete_returns_local_error() {
    let mut h = harness();
    h.local.fail_when(|op| matches!(op, CacheOp::Delete(_)));

    let err = h.storage.delete(&alice()).await.unwrap_err();

    assert!(matches!(err, Error::RemoteCache(_)));
    assert!(h.cache_topic.drain::<Value>().unwrap().is_empty());
}

#[tokio::test]
async fn publish_without_subscriber_fails() {
    let h = harness();
    drop(h.cache_topic);

    let err = h.storage.store(&alice()).await.unwrap_err();

    assert!(matches!(err, Error::BusPublish { ref topic, .. } if topic == "midCache"));
}

struct SlowStore;

impl RelationalStore<Value> for SlowStore {
    async fn create(&self, _key: &EntityKey, _record: &EntityRecord<Value>) -> Result<(), Error> {
        Ok(())
    }

    async fn find(&self, _key: &EntityKey) -> Result<Option<Value>, Error> {
        Ok(None)
    }

    async fn find_all(&self, _condition: &FieldCondition) -> Result<Vec<Value>, Error> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Vec::new())
    }

    async fn update(&self, _key: &EntityKey, _fields: Map<String, Value>) -> Result<(), Error> {
        Ok(())
    }

    async fn delete(&self, _key: &EntityKey) -> Result<(), Error> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out() -> TestResult {
    let storage = BaseStorage::builder(MockCache::<Value>::new(), MockCache::new(), SlowStore, InProcessBus::new())
        .call_timeout(Duration::from_millis(100))
        .build()?;

    let err = storage.filter(Gid::new(1), &FieldCondition::like("name", "A")).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Timeout {
            tier: "store",
            after
        } if after == Duration::from_millis(100)
    ));
    Ok(())
}

#[tokio::test]
async fn builder_rejects_shared_topic() {
    let result = BaseStorage::builder(
        MockCache::<Value>::new(),
        MockCache::<Value>::new(),
        MemoryStore::<Value>::new(),
        InProcessBus::new(),
    )
    .cache_topic("events")
    .store_topic("events")
    .build();

    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn unknown_key_domain_is_rejected() {
    let err = "uuid".parse::<KeyDomain>().unwrap_err();
    assert!(matches!(err, Error::UnsupportedKeyDomain(ref name) if name == "uuid"));
}
