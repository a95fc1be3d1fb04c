// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tierstore_tier::{EntityKey, EntityRecord, Error, FieldCondition, Fields, RelationalStore};

/// An in-process [`RelationalStore`].
///
/// Conditions are evaluated with the same rules as [`QuerySet::filter`](crate::QuerySet::filter).
/// Records are returned in insertion order. Cloning is cheap and clones share
/// the same rows.
#[derive(Debug)]
pub struct MemoryStore<V> {
    rows: Arc<RwLock<Vec<(EntityKey, V)>>>,
}

impl<V> Clone for MemoryStore<V> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStore<V> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

fn merge<V>(current: &V, fields: Map<String, Value>) -> Result<V, Error>
where
    V: Serialize + DeserializeOwned,
{
    let mut body = match serde_json::to_value(current).map_err(Error::serialization)? {
        Value::Object(body) => body,
        other => return Err(Error::backing_store("update", format!("record is not an object: {other}"))),
    };
    body.extend(fields);
    serde_json::from_value(Value::Object(body)).map_err(|err| Error::backing_store("update", err))
}

impl<V> RelationalStore<V> for MemoryStore<V>
where
    V: Fields + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    async fn create(&self, key: &EntityKey, record: &EntityRecord<V>) -> Result<(), Error> {
        let mut rows = self.rows.write();
        if rows.iter().any(|(existing, _)| existing == key) {
            return Err(Error::backing_store("create", format!("duplicate key `{key}`")));
        }
        rows.push((key.clone(), record.value().clone()));
        Ok(())
    }

    async fn find(&self, key: &EntityKey) -> Result<Option<V>, Error> {
        Ok(self
            .rows
            .read()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone()))
    }

    async fn find_all(&self, condition: &FieldCondition) -> Result<Vec<V>, Error> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|(_, value)| condition.matches(value))
            .map(|(_, value)| value.clone())
            .collect())
    }

    async fn update(&self, key: &EntityKey, fields: Map<String, Value>) -> Result<(), Error> {
        let mut rows = self.rows.write();
        if let Some((_, value)) = rows.iter_mut().find(|(existing, _)| existing == key) {
            *value = merge(value, fields)?;
        }
        Ok(())
    }

    async fn delete(&self, key: &EntityKey) -> Result<(), Error> {
        self.rows.write().retain(|(existing, _)| existing != key);
        Ok(())
    }
}
