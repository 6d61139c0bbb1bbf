pub mod memory;
pub mod redis;

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// Single-key operations the lock client needs from one store endpoint.
///
/// Each operation must be atomic on its own key. Connectivity failures are
/// reported as errors the `net` classifier recognizes; store-level refusals
/// as [`StoreError::Rejected`] or a redis response error.
#[async_trait]
pub trait Store: Send + Sync {
    /// Endpoint address, for logs.
    fn addr(&self) -> &str;

    /// Creates `key` with `value` and a TTL if it does not exist yet.
    /// Returns whether the record was created.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Resets the TTL of an existing record. Returns whether it existed.
    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Reachability check.
    async fn ping(&self) -> Result<(), StoreError>;
}
