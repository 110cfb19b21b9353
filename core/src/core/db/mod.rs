//! Database layer for syncbox storage.
//!
//! This module implements [`KvStore`] on top of redb:
//! - Value rows (key → optional expiry + bytes)
//! - Set rows (key → optional expiry) with their members in a multimap
//! - An expiry index used to purge elapsed keys in time order
//!
//! Expiry instants are stored as milliseconds since the epoch.

use crate::core::db::error::DatabaseError;
use crate::core::db::ttl_table::TtlTable;
use crate::core::kv::KvStore;
use crate::core::kv::error::StoreError;
use crate::types::TtlKey;
use redb::{
    MultimapTableDefinition, ReadableDatabase, ReadableMultimapTable, ReadableTable,
    TableDefinition, WriteTransaction,
};
use std::path::Path;
use std::time::{Duration, SystemTime};

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum DatabaseError {
        #[error("Database error: {0}")]
        Redb(#[from] redb::DatabaseError),

        #[error("Table error: {0}")]
        TableError(#[from] redb::TableError),

        #[error("Storage error: {0}")]
        StorageError(#[from] redb::StorageError),

        #[error("Transaction error: {0}")]
        TransactionError(#[from] redb::TransactionError),

        #[error("Commit error: {0}")]
        CommitError(#[from] redb::CommitError),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Operation against a key holding the wrong kind of value: {0}")]
        WrongType(String),
    }
}

mod ttl_table;

/// Value rows: key → (expires_at_ms, bytes)
const VALUES_TABLE: TableDefinition<&str, (Option<u64>, &[u8])> = TableDefinition::new("values");

/// Set rows: key → expires_at_ms
const SETS_TABLE: TableDefinition<&str, Option<u64>> = TableDefinition::new("sets");

/// Set members: key → member
const MEMBERS_TABLE: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("members");

/// Expiry index over both value and set rows.
const EXPIRY: TtlTable = TtlTable::new("expiry");

/// What a key currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Value { expires_at: Option<u64> },
    Set { expires_at: Option<u64> },
}

impl Slot {
    fn expires_at(self) -> Option<u64> {
        match self {
            Slot::Value { expires_at } | Slot::Set { expires_at } => expires_at,
        }
    }

    fn is_live(self, now_ms: u64) -> bool {
        is_live(self.expires_at(), now_ms)
    }
}

fn is_live(expires_at: Option<u64>, now_ms: u64) -> bool {
    expires_at.is_none_or(|at| at > now_ms)
}

fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn from_millis(ms: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_millis(ms)
}

/// Expiry instant in milliseconds for a TTL starting at `now`.
pub(crate) fn expiry_after(now: SystemTime, ttl: Duration) -> u64 {
    to_millis(now).saturating_add(ttl.as_millis() as u64)
}

/// The main database struct wrapping redb.
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Creates or opens the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = redb::Database::create(path)?;

        // Initialize tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(VALUES_TABLE)?;
            let _ = write_txn.open_table(SETS_TABLE)?;
            let _ = write_txn.open_multimap_table(MEMBERS_TABLE)?;
            EXPIRY.init(&write_txn)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

/// Read operations.
impl Database {
    pub fn get(&self, key: &str, now: SystemTime) -> Result<Option<Vec<u8>>, DatabaseError> {
        let now_ms = to_millis(now);
        let read_txn = self.db.begin_read()?;

        let sets = read_txn.open_table(SETS_TABLE)?;
        if let Some(guard) = sets.get(key)?
            && is_live(guard.value(), now_ms)
        {
            return Err(DatabaseError::WrongType(key.to_string()));
        }

        let values = read_txn.open_table(VALUES_TABLE)?;
        let Some(guard) = values.get(key)? else {
            return Ok(None);
        };

        let (expires_at, bytes) = guard.value();
        Ok(is_live(expires_at, now_ms).then(|| bytes.to_vec()))
    }

    pub fn exists(&self, key: &str, now: SystemTime) -> Result<bool, DatabaseError> {
        let now_ms = to_millis(now);
        let read_txn = self.db.begin_read()?;

        let values = read_txn.open_table(VALUES_TABLE)?;
        if let Some(guard) = values.get(key)?
            && is_live(guard.value().0, now_ms)
        {
            return Ok(true);
        }

        let sets = read_txn.open_table(SETS_TABLE)?;
        Ok(sets
            .get(key)?
            .is_some_and(|guard| is_live(guard.value(), now_ms)))
    }

    pub fn smembers(&self, key: &str, now: SystemTime) -> Result<Vec<String>, DatabaseError> {
        let now_ms = to_millis(now);
        let read_txn = self.db.begin_read()?;

        let values = read_txn.open_table(VALUES_TABLE)?;
        if let Some(guard) = values.get(key)?
            && is_live(guard.value().0, now_ms)
        {
            return Err(DatabaseError::WrongType(key.to_string()));
        }

        let sets = read_txn.open_table(SETS_TABLE)?;
        let live = sets
            .get(key)?
            .is_some_and(|guard| is_live(guard.value(), now_ms));
        if !live {
            return Ok(Vec::new());
        }

        let members_table = read_txn.open_multimap_table(MEMBERS_TABLE)?;
        let mut members = Vec::new();
        for member in members_table.get(key)? {
            members.push(member?.value().to_string());
        }
        Ok(members)
    }

    /// Returns every expiry index entry, oldest first.
    pub fn expiry_entries(&self) -> Result<Vec<TtlKey>, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        EXPIRY.all(&read_txn)
    }
}

/// Write operations.
impl Database {
    /// Writes a value row, replacing whatever the key held.
    pub fn put(
        &self,
        key: &str,
        value: &[u8],
        expires_at: Option<u64>,
    ) -> Result<(), DatabaseError> {
        let write_txn = self.db.begin_write()?;

        Self::remove_key(&write_txn, key)?;
        {
            let mut values = write_txn.open_table(VALUES_TABLE)?;
            values.insert(key, (expires_at, value))?;
        }
        if let Some(at) = expires_at {
            Self::insert_expiry(&write_txn, key, at)?;
        }

        write_txn.commit()?;
        Ok(())
    }

    /// Returns `true` if a live key was removed.
    pub fn delete(&self, key: &str, now: SystemTime) -> Result<bool, DatabaseError> {
        let write_txn = self.db.begin_write()?;

        let removed = Self::remove_key(&write_txn, key)?;

        write_txn.commit()?;
        Ok(removed.is_some_and(|slot| slot.is_live(to_millis(now))))
    }

    pub fn sadd(&self, key: &str, member: &str, now: SystemTime) -> Result<bool, DatabaseError> {
        let now_ms = to_millis(now);
        let write_txn = self.db.begin_write()?;

        match Self::slot(&write_txn, key)? {
            Some(slot @ Slot::Value { .. }) if slot.is_live(now_ms) => {
                return Err(DatabaseError::WrongType(key.to_string()));
            }
            Some(slot @ Slot::Set { .. }) if slot.is_live(now_ms) => {}
            _ => {
                // Absent or elapsed: start a fresh set without expiry.
                Self::remove_key(&write_txn, key)?;
                let mut sets = write_txn.open_table(SETS_TABLE)?;
                sets.insert(key, None::<u64>)?;
            }
        }

        let already_present = {
            let mut members = write_txn.open_multimap_table(MEMBERS_TABLE)?;
            members.insert(key, member)?
        };

        write_txn.commit()?;
        Ok(!already_present)
    }

    pub fn srem(&self, key: &str, member: &str, now: SystemTime) -> Result<bool, DatabaseError> {
        let now_ms = to_millis(now);
        let write_txn = self.db.begin_write()?;

        let removed = match Self::slot(&write_txn, key)? {
            Some(slot @ Slot::Value { .. }) if slot.is_live(now_ms) => {
                return Err(DatabaseError::WrongType(key.to_string()));
            }
            Some(slot @ Slot::Set { .. }) if slot.is_live(now_ms) => {
                let (removed, now_empty) = {
                    let mut members = write_txn.open_multimap_table(MEMBERS_TABLE)?;
                    let removed = members.remove(key, member)?;
                    let now_empty = members.get(key)?.next().is_none();
                    (removed, now_empty)
                };
                if now_empty {
                    Self::remove_key(&write_txn, key)?;
                }
                removed
            }
            _ => false,
        };

        write_txn.commit()?;
        Ok(removed)
    }

    pub fn expire(&self, key: &str, ttl: Duration, now: SystemTime) -> Result<bool, DatabaseError> {
        let write_txn = self.db.begin_write()?;
        let renewed = Self::renew_in(&write_txn, key, expiry_after(now, ttl), to_millis(now))?;
        write_txn.commit()?;
        Ok(renewed)
    }

    /// Renews every key in one write transaction. The result is aligned
    /// with `keys`: `false` where the key was absent.
    pub fn expire_many(
        &self,
        keys: &[String],
        ttl: Duration,
        now: SystemTime,
    ) -> Result<Vec<bool>, DatabaseError> {
        let now_ms = to_millis(now);
        let expires_at = expiry_after(now, ttl);
        let write_txn = self.db.begin_write()?;

        let renewed = keys
            .iter()
            .map(|key| Self::renew_in(&write_txn, key, expires_at, now_ms))
            .collect::<Result<Vec<_>, _>>()?;

        write_txn.commit()?;
        Ok(renewed)
    }

    fn renew_in(
        write_txn: &WriteTransaction,
        key: &str,
        expires_at: u64,
        now_ms: u64,
    ) -> Result<bool, DatabaseError> {
        let slot = match Self::slot(write_txn, key)? {
            Some(slot) if slot.is_live(now_ms) => slot,
            _ => return Ok(false),
        };

        match slot {
            Slot::Value { .. } => {
                let mut values = write_txn.open_table(VALUES_TABLE)?;
                let bytes = values
                    .get(key)?
                    .map(|guard| guard.value().1.to_vec())
                    .unwrap_or_default();
                values.insert(key, (Some(expires_at), bytes.as_slice()))?;
            }
            Slot::Set { .. } => {
                let mut sets = write_txn.open_table(SETS_TABLE)?;
                sets.insert(key, Some(expires_at))?;
            }
        }
        if let Some(previous) = slot.expires_at() {
            Self::remove_expiry(write_txn, key, previous)?;
        }
        Self::insert_expiry(write_txn, key, expires_at)?;
        Ok(true)
    }

    /// Physically removes elapsed keys. Index entries left behind by
    /// rewritten keys are dropped without touching the key.
    pub fn purge_expired(&self, now: SystemTime) -> Result<Vec<String>, DatabaseError> {
        let write_txn = self.db.begin_write()?;
        let mut purged = Vec::new();

        for entry in EXPIRY.elapsed(&write_txn, now)? {
            let indexed_at = to_millis(entry.timestamp);
            match Self::slot(&write_txn, &entry.key)? {
                Some(slot) if slot.expires_at() == Some(indexed_at) => {
                    Self::remove_key(&write_txn, &entry.key)?;
                    purged.push(entry.key);
                }
                _ => {
                    EXPIRY.remove(&write_txn, &entry)?;
                }
            }
        }

        write_txn.commit()?;
        Ok(purged)
    }
}

/// Internal helpers.
impl Database {
    /// What the key holds, ignoring expiry.
    fn slot(txn: &WriteTransaction, key: &str) -> Result<Option<Slot>, DatabaseError> {
        {
            let values = txn.open_table(VALUES_TABLE)?;
            if let Some(guard) = values.get(key)? {
                return Ok(Some(Slot::Value {
                    expires_at: guard.value().0,
                }));
            }
        }

        let sets = txn.open_table(SETS_TABLE)?;
        Ok(sets
            .get(key)?
            .map(|guard| Slot::Set {
                expires_at: guard.value(),
            }))
    }

    /// Removes the key's rows and its expiry entry, live or not.
    fn remove_key(txn: &WriteTransaction, key: &str) -> Result<Option<Slot>, DatabaseError> {
        let slot = Self::slot(txn, key)?;

        match slot {
            Some(Slot::Value { .. }) => {
                let mut values = txn.open_table(VALUES_TABLE)?;
                values.remove(key)?;
            }
            Some(Slot::Set { .. }) => {
                {
                    let mut sets = txn.open_table(SETS_TABLE)?;
                    sets.remove(key)?;
                }
                let mut members = txn.open_multimap_table(MEMBERS_TABLE)?;
                members.remove_all(key)?;
            }
            None => {}
        }

        if let Some(at) = slot.and_then(Slot::expires_at) {
            Self::remove_expiry(txn, key, at)?;
        }

        Ok(slot)
    }
}

/// Expiry index helpers.
impl Database {
    fn insert_expiry(
        txn: &WriteTransaction,
        key: &str,
        expires_at: u64,
    ) -> Result<(), DatabaseError> {
        let ttl_key = TtlKey {
            timestamp: from_millis(expires_at),
            key: key.to_string(),
        };
        EXPIRY.insert(txn, &ttl_key)
    }

    fn remove_expiry(
        txn: &WriteTransaction,
        key: &str,
        expires_at: u64,
    ) -> Result<(), DatabaseError> {
        let ttl_key = TtlKey {
            timestamp: from_millis(expires_at),
            key: key.to_string(),
        };
        EXPIRY.remove(txn, &ttl_key)?;
        Ok(())
    }
}

impl KvStore for Database {
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(Database::get(self, key, now)?)
    }

    fn set(&self, key: &str, value: &[u8], _now: SystemTime) -> Result<(), StoreError> {
        Ok(self.put(key, value, None)?)
    }

    fn set_ex(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        now: SystemTime,
    ) -> Result<(), StoreError> {
        Ok(self.put(key, value, Some(expiry_after(now, ttl)))?)
    }

    fn delete(&self, key: &str, now: SystemTime) -> Result<bool, StoreError> {
        Ok(Database::delete(self, key, now)?)
    }

    fn exists(&self, key: &str, now: SystemTime) -> Result<bool, StoreError> {
        Ok(Database::exists(self, key, now)?)
    }

    fn sadd(&self, key: &str, member: &str, now: SystemTime) -> Result<bool, StoreError> {
        Ok(Database::sadd(self, key, member, now)?)
    }

    fn srem(&self, key: &str, member: &str, now: SystemTime) -> Result<bool, StoreError> {
        Ok(Database::srem(self, key, member, now)?)
    }

    fn smembers(&self, key: &str, now: SystemTime) -> Result<Vec<String>, StoreError> {
        Ok(Database::smembers(self, key, now)?)
    }

    fn expire(&self, key: &str, ttl: Duration, now: SystemTime) -> Result<bool, StoreError> {
        Ok(Database::expire(self, key, ttl, now)?)
    }

    fn expire_many(
        &self,
        keys: &[String],
        ttl: Duration,
        now: SystemTime,
    ) -> Result<Vec<bool>, StoreError> {
        Ok(Database::expire_many(self, keys, ttl, now)?)
    }

    fn purge_expired(&self, now: SystemTime) -> Result<Vec<String>, StoreError> {
        Ok(Database::purge_expired(self, now)?)
    }
}

#[cfg(test)]
mod tests;
