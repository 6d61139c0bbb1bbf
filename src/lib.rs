//! Cross-process locks on top of a key-value store, with failover across an
//! ordered pool of store endpoints.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use interlock::LockClient;
//! use std::time::Duration;
//!
//! let locks = LockClient::from_url("redis://host1:6379,host2:6379/0", Duration::from_secs(60))?;
//! locks.try_lock("job-42", None).await?;
//! // critical section
//! locks.unlock("job-42").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod key;
pub mod locker;
pub mod models;
pub mod net;
pub mod pool;
pub mod store;

pub use client::LockClient;
pub use error::{ConfigError, LockError, StoreError};
pub use locker::{Locker, NoopLocker};
pub use pool::EndpointPool;
pub use store::memory::MemoryStore;
pub use store::redis::RedisStore;
pub use store::Store;
