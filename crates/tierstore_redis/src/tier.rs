// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tierstore_tier::{Cache, EntityKey, Error};

use crate::codec;

const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// A remote cache tier backed by Redis.
///
/// Values are stored as text through [`codec`]. Capacity and expiry are
/// enforced by the Redis server; a zero TTL falls back to the configured
/// default (ten minutes unless changed). Cloning is cheap and clones share the
/// underlying multiplexed connection.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use tierstore_redis::RedisCache;
/// use tierstore_tier::{Cache, EntityKey};
///
/// # async fn example() -> Result<(), tierstore_tier::Error> {
/// let cache = RedisCache::builder()
///     .key_prefix("users:")
///     .connect("redis://127.0.0.1/")
///     .await?;
///
/// cache.set(&EntityKey::Integer(7), "alice".to_string(), Duration::ZERO).await?;
/// let name: Option<String> = cache.get(&EntityKey::Integer(7)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    key_prefix: String,
    default_ttl: Duration,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("key_prefix", &self.key_prefix)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Creates a builder for a Redis cache.
    #[must_use]
    pub fn builder() -> RedisCacheBuilder {
        RedisCacheBuilder::default()
    }

    /// Connects to the Redis server at `url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteCache`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        Self::builder().connect(url).await
    }

    /// Returns the text stored under `key` without decoding it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteCache`] if the command fails.
    pub async fn get_raw(&self, key: &EntityKey) -> Result<Option<String>, Error> {
        let mut connection = self.connection.clone();
        let text: Option<String> = connection.get(self.redis_key(key)).await.map_err(Error::remote_cache)?;

        if text.is_some() {
            tracing::debug!(cache.name = "redis", cache.key = %key, "remote cache hit");
        } else {
            tracing::debug!(cache.name = "redis", cache.key = %key, "remote cache miss");
        }
        Ok(text)
    }

    /// Stores `text` under `key` without encoding it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteCache`] if the command fails.
    pub async fn set_raw(&self, key: &EntityKey, text: String, ttl: Duration) -> Result<(), Error> {
        let mut connection = self.connection.clone();
        connection
            .pset_ex::<_, _, ()>(self.redis_key(key), text, ttl_millis(ttl, self.default_ttl))
            .await
            .map_err(Error::remote_cache)
    }

    fn redis_key(&self, key: &EntityKey) -> String {
        format!("{}{key}", self.key_prefix)
    }
}

fn ttl_millis(ttl: Duration, default_ttl: Duration) -> u64 {
    let ttl = if ttl.is_zero() { default_ttl } else { ttl };
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl<V> Cache<V> for RedisCache
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, key: &EntityKey) -> Result<Option<V>, Error> {
        match self.get_raw(key).await? {
            Some(text) => codec::decode(&text).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &EntityKey, value: V, ttl: Duration) -> Result<(), Error> {
        let text = codec::encode(&value)?;
        self.set_raw(key, text, ttl).await
    }

    async fn delete(&self, key: &EntityKey) -> Result<(), Error> {
        let mut connection = self.connection.clone();
        connection
            .del::<_, ()>(self.redis_key(key))
            .await
            .map_err(Error::remote_cache)
    }

    async fn exists(&self, key: &EntityKey) -> Result<bool, Error> {
        let mut connection = self.connection.clone();
        connection.exists(self.redis_key(key)).await.map_err(Error::remote_cache)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Builder for configuring a [`RedisCache`].
#[derive(Clone, Debug)]
pub struct RedisCacheBuilder {
    key_prefix: String,
    default_ttl: Duration,
}

impl Default for RedisCacheBuilder {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl RedisCacheBuilder {
    /// Sets a prefix prepended to every key, e.g. `"users:"`.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the TTL applied when a value is stored with a zero TTL.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn build(self, connection: ConnectionManager) -> RedisCache {
        RedisCache {
            connection,
            key_prefix: self.key_prefix,
            default_ttl: self.default_ttl,
        }
    }

    /// Opens a managed connection to `url` and builds the cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteCache`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(self, url: &str) -> Result<RedisCache, Error> {
        let client = redis::Client::open(url).map_err(Error::remote_cache)?;
        let connection = ConnectionManager::new(client).await.map_err(Error::remote_cache)?;
        tracing::info!(cache.name = "redis", key_prefix = %self.key_prefix, "remote cache connected");
        Ok(self.build(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = RedisCacheBuilder::default();
        assert_eq!(builder.default_ttl, Duration::from_secs(600));
        assert!(builder.key_prefix.is_empty());
    }

    #[test]
    fn builder_overrides() {
        let builder = RedisCache::builder().key_prefix("users:").default_ttl(Duration::from_secs(5));
        assert_eq!(builder.key_prefix, "users:");
        assert_eq!(builder.default_ttl, Duration::from_secs(5));
    }

    #[test]
    fn zero_ttl_uses_default_and_never_rounds_to_zero() {
        assert_eq!(ttl_millis(Duration::ZERO, DEFAULT_TTL), 600_000);
        assert_eq!(ttl_millis(Duration::from_secs(2), DEFAULT_TTL), 2000);
        assert_eq!(ttl_millis(Duration::from_micros(10), DEFAULT_TTL), 1);
    }

    #[tokio::test]
    async fn connect_rejects_invalid_url() {
        let err = RedisCache::connect("not a url").await.unwrap_err();
        assert!(matches!(err, Error::RemoteCache(_)));
    }
}
