// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Core abstractions shared by every tier of the tierstore storage facade.
//!
//! This crate defines the vocabulary the tiers agree on:
//!
//! - [`EntityKey`] and [`KeyDomain`]: the concrete cache key and the domain an
//!   orchestrator is bound to, derived from an entity's [`Gid`].
//! - [`EntityRecord`]: an opaque value paired with its [`Gid`].
//! - [`FieldCondition`], [`FieldValue`] and [`Fields`]: field predicates that both
//!   the in-memory query layer and the relational store evaluate.
//! - [`Cache`] and [`RelationalStore`]: the traits each tier implements.
//! - [`Error`]: the error returned by every tier operation.
//!
//! # Implementing a Cache Tier
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//! use std::time::Duration;
//!
//! use tierstore_tier::{Cache, EntityKey, Error};
//!
//! struct SimpleCache<V>(RwLock<HashMap<EntityKey, V>>);
//!
//! impl<V> Cache<V> for SimpleCache<V>
//! where
//!     V: Clone + Send + Sync,
//! {
//!     async fn get(&self, key: &EntityKey) -> Result<Option<V>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &EntityKey, value: V, _ttl: Duration) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.clone(), value);
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, key: &EntityKey) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//!
//!     async fn exists(&self, key: &EntityKey) -> Result<bool, Error> {
//!         Ok(self.0.read().unwrap().contains_key(key))
//!     }
//! }
//! ```

pub mod condition;
pub mod error;
pub mod key;
mod record;
pub mod store;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
pub(crate) mod tier;

#[doc(inline)]
pub use condition::{FieldCondition, FieldValue, Fields, Predicate};
#[doc(inline)]
pub use error::{BoxError, Error, Result};
#[doc(inline)]
pub use key::{EntityKey, Gid, KeyDomain};
#[doc(inline)]
pub use record::EntityRecord;
#[doc(inline)]
pub use store::RelationalStore;
#[doc(inline)]
pub use tier::Cache;
