// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The storage contract and the orchestrator that implements it over three tiers.

use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use tierstore_tier::{Cache, EntityKey, EntityRecord, Error, FieldCondition, Fields, Gid, KeyDomain, RelationalStore};

use crate::bus::{InvalidationMessage, MessageBus};
use crate::config::StorageConfig;
use crate::query::QuerySet;

/// The repository facade application code talks to.
///
/// Writes are write-behind: a successful [`store`](Storage::store),
/// [`update`](Storage::update) or [`delete`](Storage::delete) means the caches
/// no longer hold stale data and the change was accepted by the message bus.
/// It does **not** mean the backing store has applied the change yet.
pub trait Storage<V>: Send + Sync {
    /// Creates an entity.
    ///
    /// The record is only published for asynchronous persistence; nothing is
    /// written to any tier before this returns.
    fn store(&self, record: &EntityRecord<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Replaces `old` by `new`, dropping `old` from both caches first.
    fn update(&self, old: &EntityRecord<V>, new: &EntityRecord<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Deletes an entity, dropping it from the local cache first.
    fn delete(&self, record: &EntityRecord<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Reads the records of entity `gid` that satisfy `condition`.
    ///
    /// Finding nothing is an empty [`QuerySet`], not an error.
    fn filter(&self, gid: Gid, condition: &FieldCondition) -> impl Future<Output = Result<QuerySet<V>, Error>> + Send;
}

/// The orchestrator behind [`Storage`]: a local cache `L`, a remote cache `R`,
/// a relational store `S` and a message bus `B`.
///
/// # Reads
///
/// [`filter`](Storage::filter) probes the local cache, then the remote cache,
/// by key and filters the cached value locally. If neither yields a match the
/// relational store evaluates the condition itself. The first tier with a
/// match answers; lower-tier hits do not repopulate faster tiers. A hard error
/// from a tier aborts the read instead of falling through.
///
/// # Writes
///
/// | Operation | Synchronous effect                     | Published                                                    |
/// |-----------|----------------------------------------|--------------------------------------------------------------|
/// | `store`   | none                                   | `Create(record)` on the cache topic                          |
/// | `update`  | delete from local and remote if present | `Delete(old)` on the cache topic if remote held it, then `Update[old, new]` on the store topic |
/// | `delete`  | delete from local                      | `Delete(record)` on the cache topic, then on the store topic |
///
/// Caches are invalidated before anything is published, so a failed publish
/// can leave an entry invalidated without its change being propagated.
/// Concurrent writes to the same entity are not serialized.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Value};
/// use tierstore::{BaseStorage, EntityRecord, FieldCondition, Gid, InProcessBus, MemoryStore, Storage};
/// use tierstore_tier::testing::MockCache;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tierstore::Error> {
/// let bus = InProcessBus::new();
/// let storage = BaseStorage::builder(
///     MockCache::<Value>::named("local"),
///     MockCache::<Value>::named("remote"),
///     MemoryStore::new(),
///     bus.clone(),
/// )
/// .build()?;
/// let _cache_topic = bus.subscribe("midCache")?;
///
/// let alice = EntityRecord::new(json!({"name": "Alice"}), Gid::new(1));
/// storage.store(&alice).await?;
///
/// // Persistence is deferred, so nothing is readable yet.
/// let found = storage.filter(Gid::new(1), &FieldCondition::like("name", "Ali")).await?;
/// assert!(found.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BaseStorage<V, L, R, S, B> {
    local: L,
    remote: R,
    store: S,
    bus: B,
    config: StorageConfig,
    _record: PhantomData<fn() -> V>,
}

impl<V, L, R, S, B> BaseStorage<V, L, R, S, B> {
    /// Starts configuring an orchestrator over the given tiers.
    pub fn builder(local: L, remote: R, store: S, bus: B) -> BaseStorageBuilder<V, L, R, S, B>
    where
        L: Cache<V>,
        R: Cache<V>,
        S: RelationalStore<V>,
    {
        BaseStorageBuilder {
            local,
            remote,
            store,
            bus,
            config: StorageConfig::default(),
            _record: PhantomData,
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the local cache tier.
    #[must_use]
    pub const fn local(&self) -> &L {
        &self.local
    }

    /// Returns the remote cache tier.
    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the relational store tier.
    #[must_use]
    pub const fn relational_store(&self) -> &S {
        &self.store
    }

    /// Derives the key `gid` is cached under.
    #[must_use]
    pub fn key_for(&self, gid: Gid) -> EntityKey {
        self.config.key_domain.key_for(&gid)
    }

    /// Runs `call` under the configured deadline.
    async fn deadline<T>(&self, tier: &'static str, call: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        match self.config.call_timeout() {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .map_err(|_elapsed| Error::Timeout { tier, after })?,
            None => call.await,
        }
    }

    async fn publish(&self, topic: &str, message: &InvalidationMessage<V>) -> Result<(), Error>
    where
        V: Serialize + Sync,
        B: MessageBus,
    {
        self.deadline("bus", self.bus.publish(topic, message)).await?;
        tracing::debug!(bus.topic = topic, bus.kind = %message.kind(), "published invalidation");
        Ok(())
    }
}

impl<V, L, R, S, B> Storage<V> for BaseStorage<V, L, R, S, B>
where
    V: Fields + Clone + Serialize + Send + Sync,
    L: Cache<V>,
    R: Cache<V>,
    S: RelationalStore<V>,
    B: MessageBus,
{
    async fn store(&self, record: &EntityRecord<V>) -> Result<(), Error> {
        let message = InvalidationMessage::create(record.clone());
        self.publish(&self.config.cache_topic, &message).await
    }

    async fn update(&self, old: &EntityRecord<V>, new: &EntityRecord<V>) -> Result<(), Error> {
        let key = self.key_for(old.gid());

        if Cache::<V>::exists(&self.local, &key).await? {
            Cache::<V>::delete(&self.local, &key).await?;
            tracing::debug!(cache.name = Cache::<V>::name(&self.local), cache.key = %key, "invalidated local entry");
        }

        let remote = Cache::<V>::name(&self.remote);
        if self.deadline(remote, Cache::<V>::exists(&self.remote, &key)).await? {
            self.deadline(remote, Cache::<V>::delete(&self.remote, &key)).await?;
            tracing::debug!(cache.name = remote, cache.key = %key, "invalidated remote entry");

            let message = InvalidationMessage::delete(old.clone());
            self.publish(&self.config.cache_topic, &message).await?;
        }

        let message = InvalidationMessage::update(old.clone(), new.clone());
        self.publish(&self.config.store_topic, &message).await
    }

    async fn delete(&self, record: &EntityRecord<V>) -> Result<(), Error> {
        let key = self.key_for(record.gid());
        Cache::<V>::delete(&self.local, &key).await?;

        let message = InvalidationMessage::delete(record.clone());
        self.publish(&self.config.cache_topic, &message).await?;
        self.publish(&self.config.store_topic, &message).await
    }

    async fn filter(&self, gid: Gid, condition: &FieldCondition) -> Result<QuerySet<V>, Error> {
        let key = self.key_for(gid);

        let local = Cache::<V>::name(&self.local);
        if let Some(value) = Cache::<V>::get(&self.local, &key).await? {
            let matches = QuerySet::new(vec![value]).filter(condition);
            if !matches.is_empty() {
                tracing::debug!(cache.name = local, cache.key = %key, "filter answered by local cache");
                return Ok(matches);
            }
        }

        let remote = Cache::<V>::name(&self.remote);
        if let Some(value) = self.deadline(remote, Cache::<V>::get(&self.remote, &key)).await? {
            let matches = QuerySet::new(vec![value]).filter(condition);
            if !matches.is_empty() {
                tracing::debug!(cache.name = remote, cache.key = %key, "filter answered by remote cache");
                return Ok(matches);
            }
        }

        let rows = self.deadline("store", self.store.find_all(condition)).await?;
        tracing::debug!(cache.key = %key, field = condition.field(), rows = rows.len(), "filter answered by relational store");
        Ok(QuerySet::new(rows))
    }
}

/// Builder for a [`BaseStorage`].
#[derive(Debug)]
pub struct BaseStorageBuilder<V, L, R, S, B> {
    local: L,
    remote: R,
    store: S,
    bus: B,
    config: StorageConfig,
    _record: PhantomData<fn() -> V>,
}

impl<V, L, R, S, B> BaseStorageBuilder<V, L, R, S, B> {
    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the key domain entity keys are derived in.
    #[must_use]
    pub fn key_domain(mut self, domain: KeyDomain) -> Self {
        self.config.key_domain = domain;
        self
    }

    /// Sets the cache invalidation topic.
    #[must_use]
    pub fn cache_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.cache_topic = topic.into();
        self
    }

    /// Sets the backing-store propagation topic.
    #[must_use]
    pub fn store_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.store_topic = topic.into();
        self
    }

    /// Sets the deadline applied to every remote cache, store and bus call.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Validates the configuration, binds both topics and builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid configuration, or the
    /// bus error if a topic cannot be bound.
    pub fn build(self) -> Result<BaseStorage<V, L, R, S, B>, Error>
    where
        B: MessageBus,
    {
        self.config.validate()?;
        self.bus.bind(&self.config.cache_topic)?;
        self.bus.bind(&self.config.store_topic)?;

        tracing::info!(
            key_domain = %self.config.key_domain,
            bus.cache_topic = %self.config.cache_topic,
            bus.store_topic = %self.config.store_topic,
            "storage orchestrator ready"
        );

        Ok(BaseStorage {
            local: self.local,
            remote: self.remote,
            store: self.store,
            bus: self.bus,
            config: self.config,
            _record: PhantomData,
        })
    }
}
