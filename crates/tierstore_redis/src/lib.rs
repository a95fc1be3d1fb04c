// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis remote cache tier.
//!
//! [`RedisCache`] implements [`Cache`](tierstore_tier::Cache) over a shared
//! Redis server. Values travel as text: plain strings unchanged, everything
//! else as JSON (see [`codec`]). A missing key is `Ok(None)`; connection and command
//! failures are [`Error::RemoteCache`](tierstore_tier::Error::RemoteCache).

pub mod codec;
mod tier;

#[doc(inline)]
pub use tier::{RedisCache, RedisCacheBuilder};
