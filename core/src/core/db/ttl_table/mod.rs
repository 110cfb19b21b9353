use crate::core::db::error::DatabaseError;
use crate::types::TtlKey;
use redb::{ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use std::time::SystemTime;

/// Stores `TtlKey { timestamp, key }` entries, where `timestamp` is the
/// instant the key elapses. Range scans up to `now` find elapsed keys.
pub struct TtlTable {
    definition: TableDefinition<'static, TtlKey, ()>,
}

impl TtlTable {
    pub const fn new(name: &'static str) -> Self {
        Self {
            definition: TableDefinition::new(name),
        }
    }

    pub fn init(&self, txn: &WriteTransaction) -> Result<(), DatabaseError> {
        txn.open_table(self.definition)?;
        Ok(())
    }

    pub fn insert(&self, txn: &WriteTransaction, ttl_key: &TtlKey) -> Result<(), DatabaseError> {
        let mut table = txn.open_table(self.definition)?;
        table.insert(ttl_key, &())?;
        Ok(())
    }

    /// Returns `true` if the key was present.
    pub fn remove(&self, txn: &WriteTransaction, ttl_key: &TtlKey) -> Result<bool, DatabaseError> {
        let mut table = txn.open_table(self.definition)?;
        Ok(table.remove(ttl_key)?.is_some())
    }

    /// Returns entries with `timestamp <= now`, oldest first.
    pub fn elapsed(
        &self,
        txn: &WriteTransaction,
        now: SystemTime,
    ) -> Result<Vec<TtlKey>, DatabaseError> {
        let table = txn.open_table(self.definition)?;

        // The empty key sorts first at its instant, so an exclusive bound one
        // nanosecond past `now` includes every entry stamped exactly `now`.
        let bound = TtlKey {
            timestamp: now + std::time::Duration::from_nanos(1),
            key: String::new(),
        };

        table
            .range(..bound)?
            .map(|entry| {
                let (ttl_key_guard, _) = entry?;
                Ok(ttl_key_guard.value())
            })
            .collect()
    }

    pub fn all(&self, txn: &ReadTransaction) -> Result<Vec<TtlKey>, DatabaseError> {
        let table = txn.open_table(self.definition)?;
        let mut entries = Vec::new();

        for entry in table.iter()? {
            let (ttl_key_guard, _) = entry?;
            entries.push(ttl_key_guard.value());
        }

        Ok(entries)
    }
}
