use serde::Serialize;
use sha2::{Digest, Sha256};

pub const DEFAULT_PREFIX: &str = "lock:";

/// Maps a logical key onto a fixed-shape store key.
///
/// The key is serialized with serde_json and hashed with SHA-256, so every
/// process that shares the same key type agrees on the store key. Types whose
/// serialization order is not stable (e.g. `HashMap` fields) make poor keys.
pub fn store_key<K>(prefix: &str, key: &K) -> Result<String, serde_json::Error>
where
    K: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec(key)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{}{:x}", prefix, digest))
}
