use thiserror::Error;

/// Errors returned by the lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// The record already exists: someone (possibly the caller) holds the lock.
    #[error("lock has failed: key is already held")]
    LockFailed,

    /// An extend was attempted on a key with no live record.
    #[error("lock for provided key does not exist")]
    LockDoesNotExist,

    #[error("key cannot be serialized: {0}")]
    InvalidKey(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors reported by a single store endpoint.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A definitive answer from the store that is not a connectivity problem.
    #[error("store rejected command: {0}")]
    Rejected(String),
}

/// Errors raised while building a client from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid store url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid port in endpoint {0}")]
    InvalidPort(String),

    #[error("invalid database index: {0}")]
    InvalidDatabase(String),

    #[error("invalid value for parameter {name}: {value}")]
    InvalidParam { name: String, value: String },

    #[error("endpoint pool must contain at least one store")]
    NoEndpoints,

    #[error("cannot build store client: {0}")]
    Store(#[from] StoreError),
}
