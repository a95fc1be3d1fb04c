// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The persistent backing store abstraction.

use serde_json::{Map, Value};

use crate::{EntityKey, EntityRecord, Error, FieldCondition};

/// A persistent store of records of one static type `V`.
///
/// The store evaluates [`FieldCondition`]s at the source. Implementations that
/// route reads to replicas may return data that lags a recent write; callers
/// must tolerate that.
///
/// "No rows" is not an error: [`find`](RelationalStore::find) returns
/// `Ok(None)` and [`find_all`](RelationalStore::find_all) returns an empty
/// vector. Connectivity and integrity failures are reported as
/// [`Error::BackingStore`].
pub trait RelationalStore<V>: Send + Sync {
    /// Inserts a new record.
    fn create(&self, key: &EntityKey, record: &EntityRecord<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Loads the record stored under `key`.
    fn find(&self, key: &EntityKey) -> impl Future<Output = Result<Option<V>, Error>> + Send;

    /// Loads every record matching `condition`.
    fn find_all(&self, condition: &FieldCondition) -> impl Future<Output = Result<Vec<V>, Error>> + Send;

    /// Overwrites the given fields of the record stored under `key`.
    fn update(&self, key: &EntityKey, fields: Map<String, Value>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes the record stored under `key`. Removing an absent record succeeds.
    fn delete(&self, key: &EntityKey) -> impl Future<Output = Result<(), Error>> + Send;
}
