//! Address lifecycle: creation, existence probes, sliding-window renewal and
//! deletion. An address is live exactly while its record key is live.

use crate::core::error::SyncError;
use crate::core::generator;
use crate::core::kv::KvStore;
use crate::types::record::codec;
use crate::types::{Address, AddressConfig, AddressRecord};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

pub(crate) fn address_key(address: &Address) -> String {
    format!("addr:{address}")
}

pub struct AddressRegistry<S> {
    store: Arc<S>,
    ttl: Duration,
    rules: AddressConfig,
}

impl<S> Clone for AddressRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
            rules: self.rules.clone(),
        }
    }
}

impl<S: KvStore> AddressRegistry<S> {
    pub fn new(store: Arc<S>, ttl: Duration, rules: AddressConfig) -> Self {
        Self { store, ttl, rules }
    }
}

/// Record operations.
impl<S: KvStore> AddressRegistry<S> {
    /// Writes a fresh record with a full TTL. Overwrites blindly; callers
    /// check for an existing address first.
    pub fn create(
        &self,
        address: &Address,
        is_custom: bool,
        now: SystemTime,
    ) -> Result<AddressRecord, SyncError> {
        let record = AddressRecord {
            address: address.clone(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + self.ttl,
            is_custom,
        };
        self.write(&record, now)?;

        info!(address = %address, is_custom, "address created");
        Ok(record)
    }

    /// Reads the record without renewing it.
    pub fn get(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Option<AddressRecord>, SyncError> {
        match self.store.get(&address_key(address), now)? {
            Some(data) => Ok(Some(codec::decode(&data, address)?)),
            None => Ok(None),
        }
    }

    /// Existence probe. Does not renew the TTL.
    pub fn exists(&self, address: &Address, now: SystemTime) -> Result<bool, SyncError> {
        Ok(self.store.exists(&address_key(address), now)?)
    }

    /// Renews a live record from `now`. Returns `None` if the address is gone.
    pub fn touch(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Option<AddressRecord>, SyncError> {
        let Some(mut record) = self.get(address, now)? else {
            return Ok(None);
        };

        record.last_accessed_at = now;
        record.expires_at = now + self.ttl;
        self.write(&record, now)?;

        debug!(address = %address, "address touched");
        Ok(Some(record))
    }

    /// Removes the record. Idempotent.
    pub fn delete(&self, address: &Address, now: SystemTime) -> Result<(), SyncError> {
        if self.store.delete(&address_key(address), now)? {
            info!(address = %address, "address deleted");
        }
        Ok(())
    }

    fn write(&self, record: &AddressRecord, now: SystemTime) -> Result<(), SyncError> {
        let data = codec::encode(record)?;
        self.store
            .set_ex(&address_key(&record.address), &data, self.ttl, now)?;
        Ok(())
    }
}

/// Allocation.
impl<S: KvStore> AddressRegistry<S> {
    /// Allocates a fresh random address.
    pub fn allocate_random(&self, now: SystemTime) -> Result<AddressRecord, SyncError> {
        let length = self.rules.random_length;
        self.allocate_with(|| generator::generate_random(length), now)
    }

    /// Draws candidates until one is free, at most `collision_retry_max` times.
    pub fn allocate_with(
        &self,
        mut candidates: impl FnMut() -> Address,
        now: SystemTime,
    ) -> Result<AddressRecord, SyncError> {
        let attempts = self.rules.collision_retry_max;

        for attempt in 1..=attempts {
            let candidate = candidates();
            if self.exists(&candidate, now)? {
                warn!(address = %candidate, attempt, "random address collision");
                continue;
            }
            return self.create(&candidate, false, now);
        }

        Err(SyncError::AllocationExhausted { attempts })
    }

    /// Claims a caller-chosen address.
    pub fn create_custom(&self, token: &str, now: SystemTime) -> Result<AddressRecord, SyncError> {
        if !generator::validate_custom(token, &self.rules) {
            return Err(SyncError::InvalidInput(format!(
                "custom address must be {} to {} ASCII letters or digits",
                self.rules.min_custom_length, self.rules.max_length
            )));
        }
        let address =
            Address::try_from(token).map_err(|e| SyncError::InvalidInput(e.to_string()))?;

        if self.exists(&address, now)? {
            return Err(SyncError::Conflict(address));
        }
        self.create(&address, true, now)
    }
}
