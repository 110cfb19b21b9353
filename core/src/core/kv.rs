//! The key-value store interface consumed by the engine.
//!
//! Keys are strings and share one keyspace: a key holds either a value or a
//! set. Every call takes `now` so expiry decisions are explicit. A key whose
//! TTL has elapsed behaves as absent on every call, whether or not it has
//! been physically purged yet.

use crate::core::db::error::DatabaseError;
use std::time::{Duration, SystemTime};

pub mod error {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum StoreError {
        #[error("Database error: {0}")]
        Database(#[from] DatabaseError),

        #[error("Store unavailable: {0}")]
        Unavailable(String),
    }
}

use error::StoreError;

pub trait KvStore: Send + Sync {
    /// Returns the value of a live key.
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores a value without expiry, replacing whatever the key held.
    fn set(&self, key: &str, value: &[u8], now: SystemTime) -> Result<(), StoreError>;

    /// Stores a value that elapses after `ttl`, replacing whatever the key held.
    fn set_ex(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        now: SystemTime,
    ) -> Result<(), StoreError>;

    /// Returns `true` if a live key was removed.
    fn delete(&self, key: &str, now: SystemTime) -> Result<bool, StoreError>;

    fn exists(&self, key: &str, now: SystemTime) -> Result<bool, StoreError>;

    /// Adds a member to a set, creating a set without expiry if needed.
    /// Returns `true` if the member was not already present.
    fn sadd(&self, key: &str, member: &str, now: SystemTime) -> Result<bool, StoreError>;

    /// Removes a member. A set left empty is deleted.
    /// Returns `true` if the member was present.
    fn srem(&self, key: &str, member: &str, now: SystemTime) -> Result<bool, StoreError>;

    /// Members of a live set, or empty if the key is absent.
    fn smembers(&self, key: &str, now: SystemTime) -> Result<Vec<String>, StoreError>;

    /// Sets the TTL of a live key. Returns `false` if the key is absent.
    fn expire(&self, key: &str, ttl: Duration, now: SystemTime) -> Result<bool, StoreError>;

    /// Sets the TTL of each live key. The result is aligned with `keys`.
    fn expire_many(
        &self,
        keys: &[String],
        ttl: Duration,
        now: SystemTime,
    ) -> Result<Vec<bool>, StoreError> {
        keys.iter().map(|key| self.expire(key, ttl, now)).collect()
    }

    /// Physically removes every key whose TTL has elapsed, oldest first.
    fn purge_expired(&self, now: SystemTime) -> Result<Vec<String>, StoreError>;
}
