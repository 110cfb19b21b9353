//! Per-address collections of text entries and file metadata.
//!
//! Each entry kind uses two store primitives:
//! - an item key `{kind}:{address}:{id}` holding the encoded entry
//! - a membership set `{kind}s:{address}` holding the ids
//!
//! Both carry their own TTL. A set can outlive some of its items, so listing
//! skips ids whose item is gone.

use crate::core::error::SyncError;
use crate::core::generator;
use crate::core::kv::KvStore;
use crate::types::record::codec;
use crate::types::{Address, Entry, FileMetadata, TextEntry};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

fn item_key<E: Entry>(address: &Address, id: &str) -> String {
    format!("{}:{address}:{id}", E::ITEM_PREFIX)
}

fn list_key<E: Entry>(address: &Address) -> String {
    format!("{}:{address}", E::LIST_PREFIX)
}

pub struct ContentIndex<S> {
    store: Arc<S>,
    ttl: Duration,
    max_text_bytes: u64,
}

impl<S> Clone for ContentIndex<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
            max_text_bytes: self.max_text_bytes,
        }
    }
}

impl<S: KvStore> ContentIndex<S> {
    pub fn new(store: Arc<S>, ttl: Duration, max_text_bytes: u64) -> Self {
        Self {
            store,
            ttl,
            max_text_bytes,
        }
    }
}

/// Text operations.
impl<S: KvStore> ContentIndex<S> {
    pub fn save_text(
        &self,
        address: &Address,
        content: &str,
        now: SystemTime,
    ) -> Result<TextEntry, SyncError> {
        if content.len() as u64 > self.max_text_bytes {
            return Err(SyncError::InvalidInput(format!(
                "text is {} bytes, limit is {}",
                content.len(),
                self.max_text_bytes
            )));
        }

        let entry = TextEntry {
            id: generator::generate_file_id(),
            address: address.clone(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.save(&entry, now)?;
        Ok(entry)
    }

    pub fn get_text(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<Option<TextEntry>, SyncError> {
        self.get(address, id, now)
    }

    /// Newest first.
    pub fn list_texts(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<TextEntry>, SyncError> {
        self.list(address, now)
    }

    /// Idempotent. Returns `true` if the entry was live.
    pub fn delete_text(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<bool, SyncError> {
        self.delete::<TextEntry>(address, id, now)
    }

    /// Returns the ids that were listed in the membership set.
    pub fn delete_all_texts(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<String>, SyncError> {
        self.delete_all::<TextEntry>(address, now)
    }
}

/// File metadata operations.
impl<S: KvStore> ContentIndex<S> {
    /// Stores the metadata as given. `original_name` is expected to be
    /// repaired already, so it agrees with the stored `filename`.
    pub fn save_file_metadata(
        &self,
        metadata: FileMetadata,
        now: SystemTime,
    ) -> Result<FileMetadata, SyncError> {
        self.save(&metadata, now)?;
        Ok(metadata)
    }

    pub fn get_file_metadata(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<Option<FileMetadata>, SyncError> {
        self.get(address, id, now)
    }

    /// Newest first.
    pub fn list_files(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<FileMetadata>, SyncError> {
        self.list(address, now)
    }

    /// Idempotent. Returns `true` if the entry was live.
    pub fn delete_file_metadata(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<bool, SyncError> {
        self.delete::<FileMetadata>(address, id, now)
    }

    pub fn delete_all_file_metadata(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<String>, SyncError> {
        self.delete_all::<FileMetadata>(address, now)
    }
}

/// TTL renewal.
impl<S: KvStore> ContentIndex<S> {
    /// Restarts the TTL of both membership sets and every live item from
    /// `now`, in a single store call. Returns the number of items renewed.
    pub fn renew_entries(&self, address: &Address, now: SystemTime) -> Result<usize, SyncError> {
        let lists = vec![
            list_key::<TextEntry>(address),
            list_key::<FileMetadata>(address),
        ];
        let mut keys = self.member_keys::<TextEntry>(address, now)?;
        keys.extend(self.member_keys::<FileMetadata>(address, now)?);
        if keys.is_empty() {
            return Ok(0);
        }

        let item_count = keys.len();
        keys.extend(lists);
        let renewed = self.store.expire_many(&keys, self.ttl, now)?;
        Ok(renewed.iter().take(item_count).filter(|r| **r).count())
    }
}

impl<S: KvStore> ContentIndex<S> {
    fn save<E: Entry>(&self, entry: &E, now: SystemTime) -> Result<(), SyncError> {
        let address = entry.address();
        let data = codec::encode(entry)?;
        let list = list_key::<E>(address);

        self.store
            .set_ex(&item_key::<E>(address, entry.id()), &data, self.ttl, now)?;
        self.store.sadd(&list, entry.id(), now)?;
        self.store.expire(&list, self.ttl, now)?;

        debug!(address = %address, id = %entry.id(), kind = E::TYPE_NAME, "entry saved");
        Ok(())
    }

    fn get<E: Entry>(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<Option<E>, SyncError> {
        match self.store.get(&item_key::<E>(address, id), now)? {
            Some(data) => Ok(Some(codec::decode(&data, address)?)),
            None => Ok(None),
        }
    }

    fn list<E: Entry>(&self, address: &Address, now: SystemTime) -> Result<Vec<E>, SyncError> {
        let ids = self.store.smembers(&list_key::<E>(address), now)?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get::<E>(address, &id, now)? {
                Some(entry) => entries.push(entry),
                None => {
                    debug!(address = %address, id = %id, kind = E::TYPE_NAME, "skipping expired member")
                }
            }
        }

        entries.sort_by_key(|entry| std::cmp::Reverse(entry.created_at()));
        Ok(entries)
    }

    fn delete<E: Entry>(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<bool, SyncError> {
        let removed = self.store.delete(&item_key::<E>(address, id), now)?;
        self.store.srem(&list_key::<E>(address), id, now)?;

        if removed {
            debug!(address = %address, id = %id, kind = E::TYPE_NAME, "entry deleted");
        }
        Ok(removed)
    }

    fn delete_all<E: Entry>(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<String>, SyncError> {
        let list = list_key::<E>(address);
        let ids = self.store.smembers(&list, now)?;

        for id in &ids {
            self.store.delete(&item_key::<E>(address, id), now)?;
        }
        self.store.delete(&list, now)?;

        debug!(address = %address, count = ids.len(), kind = E::TYPE_NAME, "entries cleared");
        Ok(ids)
    }

    fn member_keys<E: Entry>(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<String>, SyncError> {
        Ok(self
            .store
            .smembers(&list_key::<E>(address), now)?
            .iter()
            .map(|id| item_key::<E>(address, id))
            .collect())
    }
}
