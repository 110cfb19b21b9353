//! Active expiry sweep.
//!
//! The store expires keys lazily, and blobs on disk have no TTL at all. A
//! sweep run reconciles both with the clock:
//! 1. purge elapsed keys from the store
//! 2. remove blob directories of addresses that are gone
//! 3. inside live addresses, remove blobs with no metadata row and drop
//!    metadata rows whose blob is missing
//! 4. remove abandoned spooled uploads
//!
//! Blobs younger than the grace period are left alone, since an upload
//! commits its blob before writing the metadata row.

use crate::core::blob_store::BlobStore;
use crate::core::content_index::ContentIndex;
use crate::core::error::SyncError;
use crate::core::kv::KvStore;
use crate::core::registry::AddressRegistry;
use crate::types::metadata::SWEEP_METADATA_KEY;
use crate::types::{Address, SweepMetadata};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info};

/// Minimum age of an unreferenced blob before the sweep removes it.
pub const ORPHAN_GRACE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub keys_purged: usize,
    pub directories_removed: usize,
    pub orphaned_blobs_removed: usize,
    pub dangling_metadata_removed: usize,
    pub stale_uploads_removed: usize,
}

pub struct ExpirySweep<S> {
    store: Arc<S>,
    registry: AddressRegistry<S>,
    content: ContentIndex<S>,
    blobs: BlobStore,
    /// Age after which a spooled upload counts as abandoned.
    stale_upload_after: Duration,
}

impl<S: KvStore> ExpirySweep<S> {
    pub fn new(
        store: Arc<S>,
        registry: AddressRegistry<S>,
        content: ContentIndex<S>,
        blobs: BlobStore,
        stale_upload_after: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            content,
            blobs,
            stale_upload_after,
        }
    }

    /// Runs every sweep step once and records the run time.
    pub fn run(&self, now: SystemTime) -> Result<SweepOutcome, SyncError> {
        let mut outcome = SweepOutcome {
            keys_purged: self.store.purge_expired(now)?.len(),
            ..SweepOutcome::default()
        };

        for address in self.blobs.list_address_dirs()? {
            if !self.registry.exists(&address, now)? {
                if self.blobs.delete_address_directory(&address) {
                    outcome.directories_removed += 1;
                }
                continue;
            }
            self.reconcile_address(&address, now, &mut outcome)?;
        }

        let cutoff = now.checked_sub(self.stale_upload_after).unwrap_or(now);
        for path in self.blobs.stale_uploads(cutoff)? {
            if self.blobs.remove_upload(&path) {
                outcome.stale_uploads_removed += 1;
            }
        }

        self.set_metadata(
            &SweepMetadata {
                last_run_at: Some(now),
            },
            now,
        )?;

        info!(
            keys_purged = outcome.keys_purged,
            directories_removed = outcome.directories_removed,
            orphaned_blobs_removed = outcome.orphaned_blobs_removed,
            dangling_metadata_removed = outcome.dangling_metadata_removed,
            stale_uploads_removed = outcome.stale_uploads_removed,
            "expiry sweep finished"
        );
        Ok(outcome)
    }

    fn reconcile_address(
        &self,
        address: &Address,
        now: SystemTime,
        outcome: &mut SweepOutcome,
    ) -> Result<(), SyncError> {
        let files = self.content.list_files(address, now)?;
        let known: HashSet<&str> = files.iter().map(|f| f.id.as_str()).collect();

        for (id, path) in self.blobs.list_blobs(address)? {
            if !known.contains(id.as_str())
                && is_older_than(&path, now, ORPHAN_GRACE)
                && self.blobs.delete_blob(&path)
            {
                debug!(address = %address, id = %id, "orphaned blob removed");
                outcome.orphaned_blobs_removed += 1;
            }
        }

        for file in &files {
            if !self.blobs.blob_exists(&file.path)
                && self.content.delete_file_metadata(address, &file.id, now)?
            {
                debug!(address = %address, id = %file.id, "metadata without blob removed");
                outcome.dangling_metadata_removed += 1;
            }
        }

        Ok(())
    }
}

/// Run bookkeeping.
impl<S: KvStore> ExpirySweep<S> {
    pub fn metadata(&self, now: SystemTime) -> SweepMetadata {
        self.store
            .get(SWEEP_METADATA_KEY, now)
            .ok()
            .flatten()
            .and_then(|data| serde_json::from_slice(&data).ok())
            .unwrap_or_default()
    }

    /// Returns true if the sweep never ran or `interval` has elapsed since.
    pub fn should_run(&self, now: SystemTime, interval: Duration) -> bool {
        match self.metadata(now).last_run_at {
            None => true,
            Some(last) => now
                .duration_since(last)
                .map(|d| d >= interval)
                .unwrap_or(true),
        }
    }

    fn set_metadata(&self, metadata: &SweepMetadata, now: SystemTime) -> Result<(), SyncError> {
        let json = serde_json::to_vec(metadata)?;
        self.store.set(SWEEP_METADATA_KEY, &json, now)?;
        Ok(())
    }
}

fn is_older_than(path: &Path, now: SystemTime, age: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .is_ok_and(|modified| modified + age <= now)
}

/// Runs an [`ExpirySweep`] on a background thread.
///
/// The first run happens at start unless the persisted run time says the
/// interval has not elapsed yet. A failed run is logged and retried on the
/// next tick.
pub struct SweepWorker {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SweepWorker {
    pub fn spawn<S: KvStore + 'static>(sweep: ExpirySweep<S>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            if sweep.should_run(SystemTime::now(), interval) {
                run_logged(&sweep);
            }

            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => run_logged(&sweep),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("sweep worker stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Wakes the worker and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("sweep worker panicked");
        }
    }
}

impl Drop for SweepWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_logged<S: KvStore>(sweep: &ExpirySweep<S>) {
    if let Err(e) = sweep.run(SystemTime::now()) {
        error!(error = %e, "expiry sweep failed");
    }
}
