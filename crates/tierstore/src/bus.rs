// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Invalidation messages and the bus that carries them.
//!
//! Messages travel as JSON in the envelope `{"type": <kind>, "data": <payload>}`.
//! An update carries `[old, new]`; creates and deletes carry one record.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tierstore_tier::{EntityRecord, Error};
use tokio::sync::mpsc;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// What happened to the entity a message describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// The entity was created.
    Create,
    /// The entity was replaced.
    Update,
    /// The entity was removed.
    Delete,
}

impl MessageKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The records a message carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload<V> {
    /// The previous and the new version of an entity, serialized as `[old, new]`.
    Pair(EntityRecord<V>, EntityRecord<V>),
    /// A single record.
    Single(EntityRecord<V>),
}

/// A notification that an entity changed, published so that other tiers and
/// processes can drop or apply it.
///
/// # Examples
///
/// ```
/// use tierstore::{EntityRecord, Gid, InvalidationMessage};
///
/// let message = InvalidationMessage::delete(EntityRecord::new("alice", Gid::new(1)));
/// assert_eq!(
///     serde_json::to_string(&message).unwrap(),
///     r#"{"type":"delete","data":{"value":"alice","gid":1}}"#
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvalidationMessage<V> {
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(rename = "data")]
    payload: Payload<V>,
}

impl<V> InvalidationMessage<V> {
    /// A create of `record`.
    pub fn create(record: EntityRecord<V>) -> Self {
        Self {
            kind: MessageKind::Create,
            payload: Payload::Single(record),
        }
    }

    /// A replacement of `old` by `new`.
    pub fn update(old: EntityRecord<V>, new: EntityRecord<V>) -> Self {
        Self {
            kind: MessageKind::Update,
            payload: Payload::Pair(old, new),
        }
    }

    /// A delete of `record`.
    pub fn delete(record: EntityRecord<V>) -> Self {
        Self {
            kind: MessageKind::Delete,
            payload: Payload::Single(record),
        }
    }

    /// Returns the kind of change.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the carried records.
    #[must_use]
    pub const fn payload(&self) -> &Payload<V> {
        &self.payload
    }

    /// Returns the record that identifies the entity: the single record, or
    /// the old version of an update.
    #[must_use]
    pub const fn record(&self) -> &EntityRecord<V> {
        match &self.payload {
            Payload::Single(record) | Payload::Pair(record, _) => record,
        }
    }

    /// Consumes the message and returns its parts.
    #[must_use]
    pub fn into_parts(self) -> (MessageKind, Payload<V>) {
        (self.kind, self.payload)
    }
}

/// A message broker the orchestrator publishes invalidations to.
///
/// Publishing returns once the broker has accepted the message. Delivery to
/// consumers and their processing are not awaited.
pub trait MessageBus: Send + Sync {
    /// Declares `topic`. Binding an already bound topic succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker rejects the declaration.
    fn bind(&self, topic: &str) -> Result<(), Error>;

    /// Publishes `message` to `topic`.
    fn publish<V>(&self, topic: &str, message: &InvalidationMessage<V>) -> impl Future<Output = Result<(), Error>> + Send
    where
        V: Serialize + Sync;
}

#[derive(Debug)]
struct Queue {
    sender: mpsc::Sender<String>,
    receiver: Option<mpsc::Receiver<String>>,
}

/// An in-process [`MessageBus`] with one bounded queue per topic.
///
/// Each topic has a single consumer, handed out by [`subscribe`](Self::subscribe).
/// A full queue makes publishers wait. Publishing to a topic that was never
/// bound, or whose consumer has been dropped, fails with [`Error::BusPublish`].
///
/// Cloning is cheap and clones share the same topics.
///
/// # Examples
///
/// ```
/// use tierstore::{EntityRecord, Gid, InProcessBus, InvalidationMessage, MessageBus};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tierstore::Error> {
/// let bus = InProcessBus::new();
/// bus.bind("orm")?;
/// let mut orm = bus.subscribe("orm")?;
///
/// let message = InvalidationMessage::create(EntityRecord::new(7_u32, Gid::new(1)));
/// bus.publish("orm", &message).await?;
///
/// assert_eq!(orm.try_recv::<u32>().transpose()?, Some(message));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InProcessBus {
    capacity: usize,
    topics: Arc<Mutex<HashMap<String, Queue>>>,
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessBus {
    /// Creates a bus whose queues hold up to 1024 messages each.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a bus whose queues hold up to `capacity` messages each.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "bus queue capacity must be greater than zero");
        Self {
            capacity,
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Takes the consumer end of `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the topic is not bound or its
    /// consumer was already taken.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription, Error> {
        let mut topics = self.topics.lock();
        let queue = topics
            .get_mut(topic)
            .ok_or_else(|| Error::configuration(format!("topic `{topic}` is not bound")))?;
        let receiver = queue
            .receiver
            .take()
            .ok_or_else(|| Error::configuration(format!("topic `{topic}` already has a subscriber")))?;

        Ok(Subscription {
            topic: topic.to_owned(),
            receiver,
        })
    }

    /// Returns the number of messages waiting on `topic`.
    #[must_use]
    pub fn pending(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, |queue| queue.sender.max_capacity() - queue.sender.capacity())
    }
}

impl MessageBus for InProcessBus {
    fn bind(&self, topic: &str) -> Result<(), Error> {
        if topic.is_empty() {
            return Err(Error::configuration("topic name must not be empty"));
        }

        self.topics.lock().entry(topic.to_owned()).or_insert_with(|| {
            let (sender, receiver) = mpsc::channel(self.capacity);
            Queue {
                sender,
                receiver: Some(receiver),
            }
        });
        Ok(())
    }

    async fn publish<V>(&self, topic: &str, message: &InvalidationMessage<V>) -> Result<(), Error>
    where
        V: Serialize + Sync,
    {
        let text = serde_json::to_string(message).map_err(Error::serialization)?;
        let sender = self
            .topics
            .lock()
            .get(topic)
            .map(|queue| queue.sender.clone())
            .ok_or_else(|| Error::bus_publish(topic, "topic is not bound"))?;

        sender
            .send(text)
            .await
            .map_err(|_closed| Error::bus_publish(topic, "topic has no subscriber"))
    }
}

/// The consumer end of one topic of an [`InProcessBus`].
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    receiver: mpsc::Receiver<String>,
}

impl Subscription {
    /// Returns the topic this subscription reads.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once every publisher is gone and the queue is drained.
    /// A message that does not decode as `InvalidationMessage<V>` is returned
    /// as [`Error::Serialization`].
    pub async fn recv<V: DeserializeOwned>(&mut self) -> Option<Result<InvalidationMessage<V>, Error>> {
        let text = self.receiver.recv().await?;
        Some(decode(&text))
    }

    /// Returns the next message if one is already queued.
    pub fn try_recv<V: DeserializeOwned>(&mut self) -> Option<Result<InvalidationMessage<V>, Error>> {
        let text = self.receiver.try_recv().ok()?;
        Some(decode(&text))
    }

    /// Takes every message already queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if a queued message does not decode.
    pub fn drain<V: DeserializeOwned>(&mut self) -> Result<Vec<InvalidationMessage<V>>, Error> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

fn decode<V: DeserializeOwned>(text: &str) -> Result<InvalidationMessage<V>, Error> {
    serde_json::from_str(text).map_err(Error::serialization)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tierstore_tier::Gid;

    use super::*;

    #[test]
    fn update_is_serialized_as_pair() {
        let message = InvalidationMessage::update(EntityRecord::new(1, Gid::new(5)), EntityRecord::new(2, Gid::new(5)));
        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(
            wire,
            json!({"type": "update", "data": [{"value": 1, "gid": 5}, {"value": 2, "gid": 5}]})
        );
        assert_eq!(serde_json::from_value::<InvalidationMessage<i32>>(wire).unwrap(), message);
    }

    #[test]
    fn single_payload_round_trips() {
        let message = InvalidationMessage::create(EntityRecord::new(json!({"name": "Alice"}), Gid::new(9)));
        let text = serde_json::to_string(&message).unwrap();
        let decoded: InvalidationMessage<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded.kind(), MessageKind::Create);
        assert_eq!(decoded.record().gid(), Gid::new(9));
    }

    #[tokio::test]
    async fn publish_to_unbound_topic_fails() {
        let bus = InProcessBus::new();
        let message = InvalidationMessage::delete(EntityRecord::new(1, Gid::new(1)));
        let err = bus.publish("nowhere", &message).await.unwrap_err();
        assert!(matches!(err, Error::BusPublish { ref topic, .. } if topic == "nowhere"));
    }

    #[tokio::test]
    async fn publish_after_subscriber_dropped_fails() {
        let bus = InProcessBus::new();
        bus.bind("orm").unwrap();
        drop(bus.subscribe("orm").unwrap());

        let message = InvalidationMessage::delete(EntityRecord::new(1, Gid::new(1)));
        assert!(matches!(bus.publish("orm", &message).await, Err(Error::BusPublish { .. })));
    }

    #[test]
    fn topic_has_a_single_subscriber() {
        let bus = InProcessBus::new();
        bus.bind("midCache").unwrap();
        bus.bind("midCache").unwrap();
        let _first = bus.subscribe("midCache").unwrap();
        assert!(matches!(bus.subscribe("midCache"), Err(Error::Configuration(_))));
        assert!(bus.subscribe("unbound").is_err());
    }

    #[tokio::test]
    async fn drain_returns_queued_messages_in_order() {
        let bus = InProcessBus::new();
        bus.bind("orm").unwrap();
        let mut orm = bus.subscribe("orm").unwrap();

        let first = InvalidationMessage::create(EntityRecord::new(1, Gid::new(1)));
        let second = InvalidationMessage::delete(EntityRecord::new(1, Gid::new(1)));
        bus.publish("orm", &first).await.unwrap();
        bus.publish("orm", &second).await.unwrap();
        assert_eq!(bus.pending("orm"), 2);

        assert_eq!(orm.drain::<i32>().unwrap(), vec![first, second]);
        assert!(orm.try_recv::<i32>().is_none());
    }
}
