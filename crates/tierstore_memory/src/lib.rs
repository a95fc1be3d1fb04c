// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Bounded in-process cache tier.
//!
//! This crate provides [`LocalCache`], the fastest tier of a tierstore
//! deployment: a capacity-bounded map with least-recently-used eviction,
//! per-entry TTL, and a background task that sweeps expired entries. Use
//! [`LocalCacheBuilder`] to configure it.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use tierstore_memory::LocalCache;
//! use tierstore_tier::{Cache, EntityKey};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tierstore_tier::Error> {
//! let cache = LocalCache::<i32>::builder()
//!     .capacity(1000)
//!     .sweep_interval(Duration::from_secs(30))
//!     .build()?;
//!
//! cache.set(&EntityKey::from("key"), 42, Duration::from_secs(300)).await?;
//! assert_eq!(cache.get(&EntityKey::from("key")).await?, Some(42));
//! cache.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Capacity limits**: the least recently used entry is evicted to admit a new key
//! - **TTL**: expired entries are never returned and are swept in the background
//! - **Concurrency**: lookups that do not change recency share a reader lock
//! - **Shutdown**: [`LocalCache::stop`] is idempotent and waits for the sweeper

pub mod builder;
mod lru;
pub mod tier;

#[doc(inline)]
pub use builder::LocalCacheBuilder;
#[doc(inline)]
pub use tier::LocalCache;
