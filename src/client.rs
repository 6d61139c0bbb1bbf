use crate::config::StoreUrl;
use crate::error::{ConfigError, LockError, StoreError};
use crate::key::{self, DEFAULT_PREFIX};
use crate::locker::Locker;
use crate::net::is_network_error;
use crate::pool::EndpointPool;
use crate::store::redis::RedisStore;
use crate::store::Store;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Value stored under a held key.
pub const HELD: &str = "t";

/// Cross-process lock backed by a pool of store endpoints.
///
/// Each operation runs against the active endpoint. A connectivity failure
/// rotates the pool and retries on the next endpoint, at most once per
/// endpoint; any other outcome is returned as is. The pool guard is held for
/// the whole operation, so concurrent callers see failover one at a time.
///
/// Locks are not reentrant and carry no owner: `unlock` deletes the key
/// whoever set it.
pub struct LockClient {
    lifetime: Duration,
    prefix: String,
    pool: Mutex<EndpointPool>,
}

impl LockClient {
    pub fn new(pool: EndpointPool, lifetime: Duration) -> Self {
        Self {
            lifetime,
            prefix: DEFAULT_PREFIX.to_string(),
            pool: Mutex::new(pool),
        }
    }

    /// Builds a client over every endpoint of a redis url, in url order.
    /// Example: `redis://:password@host1:6379,host2:6379/12`.
    pub fn from_url(url: &str, lifetime: Duration) -> Result<Self, ConfigError> {
        let url: StoreUrl = url.parse()?;
        Self::from_store_url(&url, lifetime)
    }

    pub fn from_store_url(url: &StoreUrl, lifetime: Duration) -> Result<Self, ConfigError> {
        let pool = EndpointPool::new(redis_stores(url)?)?;
        Ok(Self::new(pool, lifetime))
    }

    /// Like [`from_url`](Self::from_url), but pings every endpoint first and
    /// starts with the one that answers fastest.
    pub async fn connect_by_latency(url: &StoreUrl, lifetime: Duration) -> Result<Self, ConfigError> {
        let pool = EndpointPool::ordered_by_latency(redis_stores(url)?).await?;
        Ok(Self::new(pool, lifetime))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub async fn active_endpoint(&self) -> String {
        self.pool.lock().await.active().addr().to_string()
    }

    /// Takes the lock for `lifetime`, or the client default when `None`.
    ///
    /// Fails with [`LockError::LockFailed`] when the key is already held,
    /// including by this caller. The existing record is left untouched.
    pub async fn try_lock<K>(&self, key: &K, lifetime: Option<Duration>) -> Result<(), LockError>
    where
        K: Serialize + ?Sized,
    {
        let store_key = key::store_key(&self.prefix, key)?;
        let ttl = lifetime.unwrap_or(self.lifetime);
        let k = store_key.as_str();

        let created = self
            .with_failover("acquire", move |store| async move {
                store.set_if_absent(k, HELD, ttl).await
            })
            .await?;

        if created {
            log::debug!("[ACQUIRE] {} held for {:?}", store_key, ttl);
            Ok(())
        } else {
            log::debug!("[ACQUIRE FAILED] {} is already held", store_key);
            Err(LockError::LockFailed)
        }
    }

    /// Reports whether the key is held.
    ///
    /// This is a liveness check, not a safety check: any error, including an
    /// outage of every endpoint, reads as `false`. Do not branch on it where
    /// a wrong "unlocked" answer matters; use [`try_lock`](Self::try_lock).
    pub async fn is_locked<K>(&self, key: &K) -> bool
    where
        K: Serialize + ?Sized,
    {
        let store_key = match key::store_key(&self.prefix, key) {
            Ok(k) => k,
            Err(e) => {
                log::warn!("[CHECK] Key cannot be serialized: {}", e);
                return false;
            }
        };
        let k = store_key.as_str();

        match self
            .with_failover("check", move |store| async move { store.get(k).await })
            .await
        {
            Ok(value) => value.as_deref() == Some(HELD),
            Err(e) => {
                log::warn!("[CHECK] Reporting {} as unlocked after store error: {}", store_key, e);
                false
            }
        }
    }

    /// Deletes the key. Unlocking a free key succeeds.
    pub async fn unlock<K>(&self, key: &K) -> Result<(), LockError>
    where
        K: Serialize + ?Sized,
    {
        let store_key = key::store_key(&self.prefix, key)?;
        let k = store_key.as_str();

        self.with_failover("release", move |store| async move { store.delete(k).await })
            .await?;
        log::debug!("[RELEASE] {} released", store_key);
        Ok(())
    }

    /// Resets the TTL of a held key without touching its value.
    ///
    /// Fails with [`LockError::LockDoesNotExist`] when there is nothing to
    /// extend; the caller should acquire again instead.
    pub async fn expire<K>(&self, key: &K, lifetime: Option<Duration>) -> Result<(), LockError>
    where
        K: Serialize + ?Sized,
    {
        let store_key = key::store_key(&self.prefix, key)?;
        let ttl = lifetime.unwrap_or(self.lifetime);
        let k = store_key.as_str();

        let existed = self
            .with_failover("extend", move |store| async move { store.set_expiry(k, ttl).await })
            .await?;

        if existed {
            log::debug!("[EXTEND] {} extended by {:?}", store_key, ttl);
            Ok(())
        } else {
            Err(LockError::LockDoesNotExist)
        }
    }

    /// Runs `op` against the active store, rotating past endpoints that fail
    /// with a network error. Gives up after one attempt per endpoint and
    /// returns the last network error.
    async fn with_failover<T, F, Fut>(&self, name: &str, op: F) -> Result<T, StoreError>
    where
        F: Fn(Arc<dyn Store>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut pool = self.pool.lock().await;
        let attempts = pool.len();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let store = Arc::clone(pool.active());

            match op(Arc::clone(&store)).await {
                Err(err) if is_network_error(&err) => {
                    pool.rotate();
                    if attempt >= attempts {
                        log::error!(
                            "[FAILOVER] {} failed on all {} endpoints, last error from {}: {}",
                            name,
                            attempts,
                            store.addr(),
                            err
                        );
                        return Err(err);
                    }
                    log::warn!(
                        "[FAILOVER] {} failed on {} ({}/{}), switching to {}: {}",
                        name,
                        store.addr(),
                        attempt,
                        attempts,
                        pool.active().addr(),
                        err
                    );
                }
                result => return result,
            }
        }
    }
}

fn redis_stores(url: &StoreUrl) -> Result<Vec<Arc<dyn Store>>, ConfigError> {
    url.endpoints
        .iter()
        .map(|addr| -> Result<Arc<dyn Store>, ConfigError> { Ok(Arc::new(RedisStore::new(addr, url)?)) })
        .collect()
}

#[async_trait]
impl Locker for LockClient {
    async fn try_lock<K>(&self, key: &K, lifetime: Option<Duration>) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync,
    {
        LockClient::try_lock(self, key, lifetime).await
    }

    async fn unlock<K>(&self, key: &K) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync,
    {
        LockClient::unlock(self, key).await
    }

    async fn is_locked<K>(&self, key: &K) -> bool
    where
        K: Serialize + ?Sized + Sync,
    {
        LockClient::is_locked(self, key).await
    }

    async fn expire<K>(&self, key: &K, lifetime: Option<Duration>) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync,
    {
        LockClient::expire(self, key, lifetime).await
    }
}
