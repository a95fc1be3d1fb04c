// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A tiered storage facade.
//!
//! Application code reads and writes entities through the [`Storage`]
//! contract. [`BaseStorage`] implements it over three tiers and a message bus:
//!
//! 1. a local cache, usually a bounded `LocalCache` from `tierstore_memory`,
//! 2. a remote cache, usually a `RedisCache` from `tierstore_redis`,
//! 3. a [`RelationalStore`], usually a `SqliteStore` from `tierstore_sqlite`.
//!
//! Reads fall through the tiers until one of them yields records that satisfy
//! the [`FieldCondition`]. Writes only invalidate caches synchronously and
//! publish an [`InvalidationMessage`]; a [`Propagator`] consuming the bus
//! applies them to the remote cache and the relational store later.
//!
//! # Topics
//!
//! | Topic       | Default    | Carries                                   |
//! |-------------|------------|-------------------------------------------|
//! | cache topic | `midCache` | `create` and `delete`                     |
//! | store topic | `orm`      | `update` as `[old, new]`, and `delete`    |
//!
//! # Quick Start
//!
//! ```
//! use serde_json::{json, Value};
//! use tierstore::{BaseStorage, EntityRecord, FieldCondition, Gid, InProcessBus, MemoryStore, Propagator, Storage};
//! use tierstore_tier::testing::MockCache;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tierstore::Error> {
//! let bus = InProcessBus::new();
//! let remote = MockCache::<Value>::named("remote");
//! let store = MemoryStore::<Value>::new();
//! let storage = BaseStorage::builder(MockCache::<Value>::named("local"), remote.clone(), store.clone(), bus.clone()).build()?;
//!
//! let propagator = Propagator::new(remote, store, storage.config());
//! let mut cache_topic = bus.subscribe("midCache")?;
//!
//! storage.store(&EntityRecord::new(json!({"name": "Alice", "age": 30}), Gid::new(7))).await?;
//! propagator.apply_pending(&mut cache_topic).await?;
//!
//! let adults = storage.filter(Gid::new(7), &FieldCondition::range("age", 18, 65)).await?;
//! assert_eq!(adults.get_all()[0]["name"], "Alice");
//! # Ok(())
//! # }
//! ```

mod bus;
mod config;
mod memory_store;
mod propagator;
mod query;
mod storage;

pub use bus::{InProcessBus, InvalidationMessage, MessageBus, MessageKind, Payload, Subscription};
pub use config::{DEFAULT_CACHE_TOPIC, DEFAULT_STORE_TOPIC, StorageConfig};
pub use memory_store::MemoryStore;
pub use propagator::Propagator;
pub use query::{QueryError, QuerySet};
pub use storage::{BaseStorage, BaseStorageBuilder, Storage};
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub use tierstore_tier::testing;
pub use tierstore_tier::{
    BoxError, Cache, EntityKey, EntityRecord, Error, FieldCondition, FieldValue, Fields, Gid, KeyDomain, Predicate, RelationalStore,
    Result,
};
