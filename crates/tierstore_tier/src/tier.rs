// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The trait implemented by every cache tier.
//!
//! The in-process cache and the remote cache both implement [`Cache`], so the
//! storage orchestrator depends only on this trait and tests can substitute a
//! mock for either tier.

use std::time::Duration;

use crate::{EntityKey, Error};

/// A key/value cache tier.
///
/// A miss is `Ok(None)` from [`get`](Cache::get), never an error. A `ttl` of
/// [`Duration::ZERO`] asks the tier to apply its own default expiry.
pub trait Cache<V>: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &EntityKey) -> impl Future<Output = Result<Option<V>, Error>> + Send;

    /// Stores `value` under `key` for `ttl`, replacing any previous value.
    fn set(&self, key: &EntityKey, value: V, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes `key`. Removing an absent key succeeds.
    fn delete(&self, key: &EntityKey) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns `true` if `key` is present.
    fn exists(&self, key: &EntityKey) -> impl Future<Output = Result<bool, Error>> + Send;

    /// A short name for logs and errors.
    fn name(&self) -> &'static str {
        "cache"
    }
}
