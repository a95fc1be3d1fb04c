// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The bounded local cache tier.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tierstore_tier::{Cache, EntityKey, Error};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::builder::LocalCacheBuilder;
use crate::lru::LruList;

/// A capacity-bounded in-process cache with per-entry TTL.
///
/// Entries are evicted least-recently-used first once the cache holds its
/// configured capacity. A background task removes expired entries on a fixed
/// interval, so memory held by entries nobody reads again is reclaimed.
///
/// [`get`](Cache::get) promotes the entry and therefore takes the exclusive
/// lock. [`exists`](Cache::exists) is a peek under the shared lock and never
/// changes recency or expiry.
///
/// After [`stop`](LocalCache::stop), `get` and `set` fail with
/// [`Error::Closed`], `exists` reports `false` and `delete` does nothing.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tierstore_memory::LocalCache;
/// use tierstore_tier::{Cache, EntityKey};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tierstore_tier::Error> {
/// let cache = LocalCache::<String>::builder().capacity(2).build()?;
/// let key = EntityKey::Integer(1);
///
/// cache.set(&key, "alice".to_string(), Duration::from_secs(30)).await?;
/// assert_eq!(cache.get(&key).await?, Some("alice".to_string()));
///
/// cache.stop().await;
/// assert!(cache.get(&key).await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LocalCache<V> {
    shared: Arc<Shared<V>>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug)]
struct Shared<V> {
    name: &'static str,
    default_ttl: Duration,
    closed: AtomicBool,
    entries: RwLock<LruList<V>>,
}

impl<V> Shared<V> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn purge_expired(&self) -> usize {
        self.entries.write().purge_expired(Instant::now())
    }
}

impl<V> LocalCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder for a local cache.
    #[must_use]
    pub fn builder() -> LocalCacheBuilder<V> {
        LocalCacheBuilder::new()
    }

    pub(crate) fn start(builder: LocalCacheBuilder<V>, capacity: usize) -> Result<Self, Error> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| Error::configuration(format!("local cache needs a tokio runtime for its sweeper: {err}")))?;

        let shared = Arc::new(Shared {
            name: builder.name,
            default_ttl: builder.default_ttl,
            closed: AtomicBool::new(false),
            entries: RwLock::new(LruList::new(capacity)),
        });
        let shutdown = CancellationToken::new();
        let sweeper = runtime.spawn(sweep(Arc::clone(&shared), builder.sweep_interval, shutdown.clone()));

        tracing::info!(
            cache.name = shared.name,
            cache.capacity = capacity,
            sweep_interval = ?builder.sweep_interval,
            "local cache started"
        );

        Ok(Self {
            shared,
            shutdown,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }
}

impl<V> LocalCache<V> {
    /// Returns the number of entries currently held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Removes every expired entry now and returns how many were removed.
    ///
    /// This is the same pass the background sweeper runs on its interval.
    pub fn purge_expired(&self) -> usize {
        self.shared.purge_expired()
    }

    /// Stops the sweeper, waits for it to finish and drops every entry.
    ///
    /// Calling `stop` again is a no-op. Concurrent callers all return only
    /// once the first one has finished shutting down.
    pub async fn stop(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shutdown.cancel();

        // Held across the join so later callers queue behind it.
        let mut sweeper = self.sweeper.lock().await;
        let Some(handle) = sweeper.take() else {
            return;
        };
        if let Err(err) = handle.await {
            tracing::warn!(cache.name = self.shared.name, error = %err, "local cache sweeper ended abnormally");
        }

        self.shared.entries.write().clear();
        drop(sweeper);
        tracing::info!(cache.name = self.shared.name, "local cache stopped");
    }

    fn expires_at(&self, ttl: Duration) -> Instant {
        let ttl = if ttl.is_zero() { self.shared.default_ttl } else { ttl };
        Instant::now() + ttl
    }
}

impl<V> Drop for LocalCache<V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<V> Cache<V> for LocalCache<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &EntityKey) -> Result<Option<V>, Error> {
        let mut entries = self.shared.entries.write();
        if self.shared.is_closed() {
            return Err(Error::Closed { cache: self.shared.name });
        }

        let value = entries.get(key, Instant::now()).cloned();
        drop(entries);

        if value.is_some() {
            tracing::debug!(cache.name = self.shared.name, cache.key = %key, "local cache hit");
        } else {
            tracing::debug!(cache.name = self.shared.name, cache.key = %key, "local cache miss");
        }
        Ok(value)
    }

    async fn set(&self, key: &EntityKey, value: V, ttl: Duration) -> Result<(), Error> {
        let expires_at = self.expires_at(ttl);
        let mut entries = self.shared.entries.write();
        if self.shared.is_closed() {
            return Err(Error::Closed { cache: self.shared.name });
        }

        let evicted = entries.insert(key.clone(), value, expires_at);
        drop(entries);

        if let Some(evicted) = evicted {
            tracing::debug!(cache.name = self.shared.name, cache.key = %evicted, "local cache evicted entry");
        }
        Ok(())
    }

    async fn delete(&self, key: &EntityKey) -> Result<(), Error> {
        if self.shared.is_closed() {
            return Ok(());
        }
        self.shared.entries.write().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &EntityKey) -> Result<bool, Error> {
        if self.shared.is_closed() {
            return Ok(false);
        }
        Ok(self.shared.entries.read().peek(key, Instant::now()))
    }

    fn name(&self) -> &'static str {
        self.shared.name
    }
}

async fn sweep<V>(shared: Arc<Shared<V>>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let removed = shared.purge_expired();
                if removed > 0 {
                    tracing::debug!(cache.name = shared.name, removed, "local cache swept expired entries");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: i64) -> EntityKey {
        EntityKey::Integer(id)
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_unread_expired_entries() {
        let cache = LocalCache::<i32>::builder()
            .capacity(4)
            .sweep_interval(Duration::from_secs(1))
            .build()
            .unwrap();

        cache.set(&key(1), 1, Duration::from_millis(500)).await.unwrap();
        cache.set(&key(2), 2, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.len(), 2);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.len(), 1);
        assert!(cache.exists(&key(2)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_uses_default() {
        let cache = LocalCache::<i32>::builder()
            .capacity(1)
            .default_ttl(Duration::from_secs(2))
            .build()
            .unwrap();

        cache.set(&key(1), 1, Duration::ZERO).await.unwrap();
        tokio::time::advance(Duration::from_millis(1900)).await;
        assert!(cache.exists(&key(1)).await.unwrap());
        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(!cache.exists(&key(1)).await.unwrap());
    }

    #[tokio::test]
    async fn stop_clears_entries() {
        let cache = LocalCache::<i32>::builder().capacity(2).build().unwrap();
        cache.set(&key(1), 1, Duration::from_secs(60)).await.unwrap();

        cache.stop().await;
        assert!(cache.is_closed());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_stop_waits_for_shutdown() {
        let cache = Arc::new(LocalCache::<i32>::builder().capacity(2).build().unwrap());
        cache.set(&key(1), 1, Duration::from_secs(60)).await.unwrap();

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.stop().await }
        });
        // Lets the first stop start joining the sweeper.
        tokio::task::yield_now().await;

        cache.stop().await;
        assert!(cache.is_empty(), "stop returned before shutdown finished");
        assert!(cache.sweeper.try_lock().unwrap().is_none());

        first.await.unwrap();
    }
}
