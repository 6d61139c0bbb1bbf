use crate::config::StoreUrl;
use crate::error::StoreError;
use crate::store::Store;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use std::future::Future;
use std::io;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;

const BACKOFF_BASE: u64 = 2;
const BACKOFF_FACTOR_MS: u64 = 100;
const CONNECT_RETRIES: usize = 0;

/// One Redis endpoint.
///
/// The connection is opened on first use, so an endpoint that is down while
/// the pool is built still takes part in failover once it comes back.
pub struct RedisStore {
    addr: String,
    client: redis::Client,
    connection: Mutex<Option<ConnectionManager>>,
    timeout: Duration,
}

impl RedisStore {
    pub fn new(addr: &str, url: &StoreUrl) -> Result<Self, StoreError> {
        let mut connection_info = redis::ConnectionInfo::from_str(&format!("redis://{}/{}", addr, url.db))?;

        if let Some(pwd) = &url.password {
            connection_info.redis.password = Some(pwd.clone());
        }
        if let Some(user) = &url.username {
            connection_info.redis.username = Some(user.clone());
        }

        let client = redis::Client::open(connection_info)?;
        Ok(Self {
            addr: addr.to_string(),
            client,
            connection: Mutex::new(None),
            timeout: url.timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        // One connect attempt: a refusing endpoint should fail over at once
        // instead of backing off until the timeout.
        let conn = self
            .bounded(ConnectionManager::new_with_backoff(
                self.client.clone(),
                BACKOFF_BASE,
                BACKOFF_FACTOR_MS,
                CONNECT_RETRIES,
            ))
            .await?;
        log::info!("[CONNECT] Connected to redis endpoint {}", self.addr);
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Runs a redis future under the endpoint's I/O timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} did not answer within {:?}", self.addr, self.timeout),
            ))),
        }
    }
}

fn millis(ttl: Duration) -> u64 {
    ttl.as_millis().min(u64::MAX as u128) as u64
}

#[async_trait]
impl Store for RedisStore {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;

        // SET NX PX creates the record and its TTL in one command.
        let reply: Option<String> = self
            .bounded(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(millis(ttl))
                    .query_async::<_, Option<String>>(&mut conn),
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: i64 = self.bounded(conn.del::<_, i64>(key)).await?;
        Ok(())
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(
            redis::cmd("PEXPIRE")
                .arg(key)
                .arg(millis(ttl))
                .query_async::<_, bool>(&mut conn),
        )
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = self
            .bounded(redis::cmd("PING").query_async::<_, String>(&mut conn))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_connecting() {
        let url: StoreUrl = "redis://:secret@127.0.0.1:1/3".parse().unwrap();
        let store = RedisStore::new(&url.endpoints[0], &url).unwrap();
        assert_eq!(store.addr(), "127.0.0.1:1");
    }

    #[test]
    fn builds_for_ipv6_endpoint() {
        let url: StoreUrl = "redis://[::1]:6380/0".parse().unwrap();
        let store = RedisStore::new(&url.endpoints[0], &url).unwrap();
        assert_eq!(store.addr(), "[::1]:6380");
    }

    #[tokio::test]
    async fn refused_connect_fails_fast_as_network_error() {
        // Nothing listens on port 1; the refusal must surface before the timeout.
        let url: StoreUrl = "redis://127.0.0.1:1/0?timeout_ms=5000".parse().unwrap();
        let store = RedisStore::new(&url.endpoints[0], &url).unwrap();

        let err = store.ping().await.unwrap_err();
        assert!(crate::net::is_network_error(&err));
        assert!(matches!(err, StoreError::Redis(_)), "{:?}", err);
    }
}
