// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock cache implementation for testing.
//!
//! This module provides `MockCache`, a configurable in-memory cache that
//! records all operations and supports failure injection for testing error paths.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{Cache, EntityKey, Error};

/// Recorded cache operation with full context.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOp<V> {
    /// A get operation was performed with the given key.
    Get(EntityKey),
    /// A set operation was performed.
    Set {
        /// The key that was written.
        key: EntityKey,
        /// The value that was written.
        value: V,
        /// The requested time-to-live.
        ttl: Duration,
    },
    /// A delete operation was performed with the given key.
    Delete(EntityKey),
    /// An exists operation was performed with the given key.
    Exists(EntityKey),
}

impl<V> CacheOp<V> {
    /// Returns the key the operation targeted.
    #[must_use]
    pub const fn key(&self) -> &EntityKey {
        match self {
            Self::Get(key) | Self::Delete(key) | Self::Exists(key) | Self::Set { key, .. } => key,
        }
    }
}

type FailPredicate<V> = Box<dyn Fn(&CacheOp<V>) -> bool + Send + Sync>;

/// A configurable mock cache for testing.
///
/// Values live in memory and never expire. Every operation is recorded for
/// later verification, and a predicate can make chosen operations fail.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tierstore_tier::testing::{CacheOp, MockCache};
/// use tierstore_tier::{Cache, EntityKey};
///
/// # futures::executor::block_on(async {
/// let cache = MockCache::<i32>::new();
/// let key = EntityKey::Integer(1);
///
/// cache.set(&key, 42, Duration::ZERO).await.unwrap();
/// assert_eq!(cache.get(&key).await.unwrap(), Some(42));
///
/// cache.fail_when(|op| matches!(op, CacheOp::Get(_)));
/// assert!(cache.get(&key).await.is_err());
/// # });
/// ```
pub struct MockCache<V> {
    name: &'static str,
    data: Arc<Mutex<HashMap<EntityKey, V>>>,
    operations: Arc<Mutex<Vec<CacheOp<V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<V>>>>,
}

impl<V> std::fmt::Debug for MockCache<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCache")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<V> Clone for MockCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<V> Default for MockCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockCache<V> {
    /// Creates a new empty mock cache.
    #[must_use]
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Creates a new empty mock cache that reports `name`.
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Stores `value` under `key` without recording an operation.
    pub fn seed(&self, key: impl Into<EntityKey>, value: V) {
        self.data.lock().insert(key.into(), value);
    }

    /// Returns the number of entries in the cache.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the cache contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &EntityKey) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// Failed operations are still recorded but leave the data untouched.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&CacheOp<V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn should_fail(&self, op: &CacheOp<V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }

    /// Records `op` and returns an error if it was configured to fail.
    fn record(&self, op: CacheOp<V>, what: &'static str) -> Result<(), Error> {
        let fail = self.should_fail(&op);
        self.operations.lock().push(op);
        if fail {
            return Err(Error::remote_cache(format!("mock: {what} failed")));
        }
        Ok(())
    }
}

impl<V: Clone> MockCache<V> {
    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<CacheOp<V>> {
        self.operations.lock().clone()
    }
}

impl<V> Cache<V> for MockCache<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &EntityKey) -> Result<Option<V>, Error> {
        self.record(CacheOp::Get(key.clone()), "get")?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &EntityKey, value: V, ttl: Duration) -> Result<(), Error> {
        let op = CacheOp::Set {
            key: key.clone(),
            value: value.clone(),
            ttl,
        };
        self.record(op, "set")?;
        self.data.lock().insert(key.clone(), value);
        Ok(())
    }

    async fn delete(&self, key: &EntityKey) -> Result<(), Error> {
        self.record(CacheOp::Delete(key.clone()), "delete")?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &EntityKey) -> Result<bool, Error> {
        self.record(CacheOp::Exists(key.clone()), "exists")?;
        Ok(self.data.lock().contains_key(key))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_operations_are_recorded_and_leave_data() {
        let cache = MockCache::<i32>::new();
        cache.seed(1_i64, 10);
        cache.fail_when(|op| matches!(op, CacheOp::Delete(_)));

        assert!(cache.delete(&EntityKey::Integer(1)).await.is_err());
        assert!(cache.contains_key(&EntityKey::Integer(1)));
        assert_eq!(cache.operations(), vec![CacheOp::Delete(EntityKey::Integer(1))]);

        cache.clear_failures();
        cache.delete(&EntityKey::Integer(1)).await.expect("delete should succeed");
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn op_key_returns_target() {
        let op = CacheOp::Set {
            key: EntityKey::from("k"),
            value: 1,
            ttl: Duration::ZERO,
        };
        assert_eq!(op.key(), &EntityKey::from("k"));
    }
}
