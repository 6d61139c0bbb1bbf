use crate::error::LockError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Simple inter-process locks keyed by any serializable value.
#[async_trait]
pub trait Locker: Send + Sync {
    async fn try_lock<K>(&self, key: &K, lifetime: Option<Duration>) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync;

    async fn unlock<K>(&self, key: &K) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync;

    async fn is_locked<K>(&self, key: &K) -> bool
    where
        K: Serialize + ?Sized + Sync;

    async fn expire<K>(&self, key: &K, lifetime: Option<Duration>) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync;
}

/// Locker for single-instance deployments: every lock is granted and
/// nothing is ever reported as held.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLocker;

#[async_trait]
impl Locker for NoopLocker {
    async fn try_lock<K>(&self, _key: &K, _lifetime: Option<Duration>) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync,
    {
        Ok(())
    }

    async fn unlock<K>(&self, _key: &K) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync,
    {
        Ok(())
    }

    async fn is_locked<K>(&self, _key: &K) -> bool
    where
        K: Serialize + ?Sized + Sync,
    {
        false
    }

    async fn expire<K>(&self, _key: &K, _lifetime: Option<Duration>) -> Result<(), LockError>
    where
        K: Serialize + ?Sized + Sync,
    {
        Ok(())
    }
}
