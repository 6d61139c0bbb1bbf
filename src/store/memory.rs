use crate::error::StoreError;
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Record {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Record {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// In-process store with TTL records.
///
/// Backs the service's `memory` storage type. It can also be told to fail
/// every call with a given io error kind, which is how outages of one
/// endpoint are reproduced without a network.
pub struct MemoryStore {
    addr: String,
    records: DashMap<String, Record>,
    fault: Mutex<Option<io::ErrorKind>>,
    latency: Duration,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            records: DashMap::new(),
            fault: Mutex::new(None),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes every following call fail with `kind`, or heals the store with `None`.
    pub fn fail_with(&self, kind: Option<io::ErrorKind>) {
        *self.fault.lock() = kind;
    }

    /// Number of calls served or refused so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Remaining TTL of a live record.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let record = self.records.get(key)?;
        if record.is_expired() {
            return None;
        }
        (record.expires_at - Utc::now()).to_std().ok()
    }

    /// Removes expired records, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired());
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            log::info!("[CLEANUP] Removed {} expired records from {}", removed, self.addr);
        }
        removed
    }

    async fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let fault = *self.fault.lock();
        match fault {
            Some(kind) => Err(StoreError::Io(io::Error::new(
                kind,
                format!("{} is unavailable", self.addr),
            ))),
            None => Ok(()),
        }
    }

    fn expiry(ttl: Duration) -> Result<DateTime<Utc>, StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::Rejected("invalid expire time".to_string()));
        }
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| StoreError::Rejected("expire time out of range".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.enter().await?;
        let expires_at = Self::expiry(ttl)?;

        let mut entry = self.records.entry(key.to_string()).or_insert_with(|| Record {
            value: String::new(),
            expires_at: Utc::now(),
        });
        // A placeholder inserted just now is already expired, so it is free.
        if !entry.is_expired() {
            return Ok(false);
        }
        entry.value = value.to_string();
        entry.expires_at = expires_at;
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.enter().await?;
        Ok(self
            .records
            .get(key)
            .filter(|record| !record.is_expired())
            .map(|record| record.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.enter().await?;
        self.records.remove(key);
        Ok(())
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.enter().await?;
        let expires_at = Self::expiry(ttl)?;
        match self.records.get_mut(key) {
            Some(mut record) if !record.is_expired() => {
                record.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::is_network_error;

    #[tokio::test]
    async fn set_if_absent_creates_once() {
        let store = MemoryStore::new("mem-0");
        assert!(store.set_if_absent("k", "t", Duration::from_secs(10)).await.unwrap());
        assert!(!store.set_if_absent("k", "x", Duration::from_secs(10)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn records_expire() {
        let store = MemoryStore::new("mem-0");
        store.set_if_absent("k", "t", Duration::from_millis(50)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.set_if_absent("k", "t", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn set_expiry_requires_live_record() {
        let store = MemoryStore::new("mem-0");
        assert!(!store.set_expiry("missing", Duration::from_secs(1)).await.unwrap());

        store.set_if_absent("k", "t", Duration::from_secs(1)).await.unwrap();
        assert!(store.set_expiry("k", Duration::from_secs(30)).await.unwrap());
        assert!(store.ttl("k").unwrap() > Duration::from_secs(20));
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let store = MemoryStore::new("mem-0");
        let err = store.set_if_absent("k", "t", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(!is_network_error(&err));
    }

    #[tokio::test]
    async fn lifetime_past_calendar_end_is_rejected() {
        let store = MemoryStore::new("mem-0");
        let huge = Duration::from_secs(9_000_000_000_000);

        let err = store.set_if_absent("k", "t", huge).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set_if_absent("k", "t", Duration::from_secs(10)).await.unwrap();
        let err = store.set_expiry("k", huge).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(store.ttl("k").unwrap() <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn injected_fault_is_a_network_error() {
        let store = MemoryStore::new("mem-0");
        store.fail_with(Some(io::ErrorKind::ConnectionRefused));
        let err = store.ping().await.unwrap_err();
        assert!(is_network_error(&err));

        store.fail_with(None);
        store.ping().await.unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn cleanup_drops_only_expired_records() {
        let store = MemoryStore::new("mem-0");
        store.set_if_absent("short", "t", Duration::from_millis(20)).await.unwrap();
        store.set_if_absent("long", "t", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("t"));
    }
}
