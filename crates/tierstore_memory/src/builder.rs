// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring local caches.

use std::marker::PhantomData;
use std::time::Duration;

use tierstore_tier::Error;

use crate::tier::LocalCache;

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Builder for configuring a [`LocalCache`].
///
/// Only the capacity is required. [`build`](Self::build) spawns the expiry
/// sweeper, so it must be called from within a tokio runtime.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tierstore_memory::LocalCache;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = LocalCache::<String>::builder()
///     .capacity(10_000)
///     .sweep_interval(Duration::from_secs(30))
///     .default_ttl(Duration::from_secs(120))
///     .name("users")
///     .build()
///     .expect("valid configuration");
/// # drop(cache);
/// # }
/// ```
#[derive(Debug)]
pub struct LocalCacheBuilder<V> {
    pub(crate) capacity: Option<usize>,
    pub(crate) sweep_interval: Duration,
    pub(crate) default_ttl: Duration,
    pub(crate) name: &'static str,
    _phantom: PhantomData<V>,
}

impl<V> Default for LocalCacheBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LocalCacheBuilder<V> {
    /// Creates a builder with default settings and no capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capacity: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            default_ttl: DEFAULT_TTL,
            name: "local",
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries. Must be greater than zero.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets how often the background sweep removes expired entries.
    ///
    /// Defaults to one minute.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the TTL applied when an entry is stored with a zero TTL.
    ///
    /// Defaults to five minutes.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the name reported in logs and [`Error::Closed`].
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Builds the cache and starts its sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the capacity is missing or zero, if
    /// the sweep interval is zero, or if no tokio runtime is running.
    pub fn build(self) -> Result<LocalCache<V>, Error>
    where
        V: Clone + Send + Sync + 'static,
    {
        let capacity = match self.capacity {
            Some(capacity) if capacity > 0 => capacity,
            Some(_) => return Err(Error::configuration("local cache capacity must be greater than zero")),
            None => return Err(Error::configuration("local cache capacity is required")),
        };
        if self.sweep_interval.is_zero() {
            return Err(Error::configuration("local cache sweep interval must be greater than zero"));
        }

        LocalCache::start(self, capacity)
    }
}
