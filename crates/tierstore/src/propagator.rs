// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The write-behind consumer that applies published changes.

use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tierstore_tier::{Cache, Error, KeyDomain, RelationalStore};
use tokio_util::sync::CancellationToken;

use crate::bus::{InvalidationMessage, MessageKind, Payload, Subscription};
use crate::config::StorageConfig;

/// Which half of the propagation a topic carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Cache,
    Store,
}

/// Applies the messages [`BaseStorage`](crate::BaseStorage) publishes.
///
/// On the cache topic a create is written to the remote cache and persisted to
/// the relational store, and a delete is removed from the remote cache. On the
/// store topic an update overwrites the stored fields of the old record's key
/// with the new record's fields, and a delete removes the row.
///
/// A message that fails to decode or apply is logged at `warn` and skipped.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Value};
/// use tierstore::{EntityRecord, Gid, InProcessBus, InvalidationMessage, MemoryStore, MessageBus, Propagator, StorageConfig};
/// use tierstore_tier::testing::MockCache;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tierstore::Error> {
/// let bus = InProcessBus::new();
/// bus.bind("midCache")?;
/// let store = MemoryStore::<Value>::new();
/// let propagator = Propagator::new(MockCache::<Value>::new(), store.clone(), &StorageConfig::default());
///
/// let record = EntityRecord::new(json!({"name": "Alice"}), Gid::new(1));
/// bus.publish("midCache", &InvalidationMessage::create(record)).await?;
///
/// let mut subscription = bus.subscribe("midCache")?;
/// propagator.apply_pending(&mut subscription).await?;
/// assert_eq!(store.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Propagator<V, R, S> {
    remote: R,
    store: S,
    key_domain: KeyDomain,
    cache_topic: String,
    store_topic: String,
    _record: PhantomData<fn() -> V>,
}

impl<V, R, S> Propagator<V, R, S>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
    R: Cache<V>,
    S: RelationalStore<V>,
{
    /// Creates a propagator that writes to `remote` and `store`, reading the
    /// key domain and topic names from `config`.
    pub fn new(remote: R, store: S, config: &StorageConfig) -> Self {
        Self {
            remote,
            store,
            key_domain: config.key_domain,
            cache_topic: config.cache_topic.clone(),
            store_topic: config.store_topic.clone(),
            _record: PhantomData,
        }
    }

    /// Consumes `subscription` until `shutdown` is cancelled or the topic closes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the subscription is for neither the
    /// cache topic nor the store topic.
    pub async fn run(&self, mut subscription: Subscription, shutdown: CancellationToken) -> Result<(), Error> {
        let route = self.route(subscription.topic())?;
        tracing::info!(bus.topic = subscription.topic(), "propagator started");

        loop {
            let received = tokio::select! {
                () = shutdown.cancelled() => break,
                received = subscription.recv::<V>() => received,
            };
            let Some(received) = received else {
                break;
            };
            self.handle(route, subscription.topic(), received).await;
        }

        tracing::info!(bus.topic = subscription.topic(), "propagator stopped");
        Ok(())
    }

    /// Applies every message already queued on `subscription` and returns how
    /// many were taken off the queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the subscription is for neither the
    /// cache topic nor the store topic.
    pub async fn apply_pending(&self, subscription: &mut Subscription) -> Result<usize, Error> {
        let route = self.route(subscription.topic())?;
        let mut taken = 0;
        while let Some(received) = subscription.try_recv::<V>() {
            self.handle(route, subscription.topic(), received).await;
            taken += 1;
        }
        Ok(taken)
    }

    /// Applies one message received on the cache topic.
    ///
    /// # Errors
    ///
    /// Returns the error of the tier call that failed.
    pub async fn apply_cache(&self, message: InvalidationMessage<V>) -> Result<(), Error> {
        match message.into_parts() {
            (MessageKind::Create, Payload::Single(record)) => {
                let key = record.key(self.key_domain);
                self.remote.set(&key, record.value().clone(), Duration::ZERO).await?;
                self.store.create(&key, &record).await
            }
            (MessageKind::Delete, Payload::Single(record)) => self.remote.delete(&record.key(self.key_domain)).await,
            (kind, _) => Err(unexpected(kind, &self.cache_topic)),
        }
    }

    /// Applies one message received on the store topic.
    ///
    /// # Errors
    ///
    /// Returns the error of the store call that failed, or
    /// [`Error::Serialization`] if the new record is not a JSON object.
    pub async fn apply_store(&self, message: InvalidationMessage<V>) -> Result<(), Error> {
        match message.into_parts() {
            (MessageKind::Update, Payload::Pair(old, new)) => {
                let fields = match serde_json::to_value(new.value()).map_err(Error::serialization)? {
                    Value::Object(fields) => fields,
                    other => return Err(Error::serialization(format!("updated record is not an object: {other}"))),
                };
                self.store.update(&old.key(self.key_domain), fields).await
            }
            (MessageKind::Delete, Payload::Single(record)) => self.store.delete(&record.key(self.key_domain)).await,
            (kind, _) => Err(unexpected(kind, &self.store_topic)),
        }
    }

    fn route(&self, topic: &str) -> Result<Route, Error> {
        if topic == self.cache_topic {
            Ok(Route::Cache)
        } else if topic == self.store_topic {
            Ok(Route::Store)
        } else {
            Err(Error::configuration(format!("propagator does not consume topic `{topic}`")))
        }
    }

    async fn handle(&self, route: Route, topic: &str, received: Result<InvalidationMessage<V>, Error>) {
        let message = match received {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(bus.topic = topic, error = %err, "dropping undecodable message");
                return;
            }
        };

        let kind = message.kind();
        let gid = message.record().gid();
        let applied = match route {
            Route::Cache => self.apply_cache(message).await,
            Route::Store => self.apply_store(message).await,
        };

        match applied {
            Ok(()) => tracing::debug!(bus.topic = topic, bus.kind = %kind, entity.gid = %gid, "applied message"),
            Err(err) => tracing::warn!(bus.topic = topic, bus.kind = %kind, entity.gid = %gid, error = %err, "failed to apply message"),
        }
    }
}

fn unexpected(kind: MessageKind, topic: &str) -> Error {
    Error::configuration(format!("`{kind}` messages are not expected on topic `{topic}`"))
}
