//! Storage engine combining the address registry, content index and blob store.

use crate::core::blob_store::BlobStore;
use crate::core::blob_store::error::BlobStoreError;
use crate::core::client::StoreClient;
use crate::core::content_index::ContentIndex;
use crate::core::kv::KvStore;
use crate::core::registry::AddressRegistry;
use crate::core::sweep::{ExpirySweep, SweepOutcome, SweepWorker};
use crate::types::{Address, AddressRecord, Config, FileMetadata, TextEntry, TransferItem};
use error::{NotFoundKind, SyncError};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

pub mod blob_store;
pub mod client;
pub mod content_index;
pub mod db;
pub mod generator;
pub mod kv;
pub mod registry;
pub mod sweep;

pub mod error {
    use crate::core::blob_store::error::BlobStoreError;
    use crate::core::kv::error::StoreError;
    use crate::types::{Address, AddressError, CodecError};
    use std::fmt;
    use thiserror::Error;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum NotFoundKind {
        Address,
        Text,
        File,
        /// Metadata exists but the bytes are gone from disk.
        Blob,
    }

    impl fmt::Display for NotFoundKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                NotFoundKind::Address => "Address",
                NotFoundKind::Text => "Text",
                NotFoundKind::File => "File",
                NotFoundKind::Blob => "File on disk",
            })
        }
    }

    /// Coarse classification for mapping errors to external statuses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ErrorKind {
        NotFound,
        Conflict,
        InvalidInput,
        AllocationExhausted,
        StorageUnavailable,
    }

    #[derive(Debug, Error)]
    pub enum SyncError {
        #[error("{0} not found")]
        NotFound(NotFoundKind),

        #[error("Address already exists: {0}")]
        Conflict(Address),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("Invalid address: {0}")]
        InvalidAddress(#[from] AddressError),

        #[error("No free address after {attempts} attempts")]
        AllocationExhausted { attempts: u32 },

        #[error("Store error: {0}")]
        Store(#[from] StoreError),

        #[error("Corrupt record: {0}")]
        Corrupt(#[from] CodecError),

        #[error("Blob store error: {0}")]
        BlobStore(#[from] BlobStoreError),

        #[error("Metadata error: {0}")]
        Metadata(#[from] serde_json::Error),
    }

    impl SyncError {
        pub fn kind(&self) -> ErrorKind {
            match self {
                SyncError::NotFound(_) => ErrorKind::NotFound,
                SyncError::Conflict(_) => ErrorKind::Conflict,
                SyncError::InvalidInput(_)
                | SyncError::InvalidAddress(_)
                | SyncError::BlobStore(
                    BlobStoreError::MissingUpload(_) | BlobStoreError::TooLarge { .. },
                ) => ErrorKind::InvalidInput,
                SyncError::AllocationExhausted { .. } => ErrorKind::AllocationExhausted,
                SyncError::Store(_)
                | SyncError::Corrupt(_)
                | SyncError::BlobStore(_)
                | SyncError::Metadata(_) => ErrorKind::StorageUnavailable,
            }
        }
    }
}

/// Result of [`SyncCore::check_address_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressStatus {
    pub exists: bool,
    pub record: Option<AddressRecord>,
}

/// Caller-supplied description of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub original_name: String,
    pub mime_type: String,
}

/// An opened blob plus the metadata needed to serve it.
#[derive(Debug)]
pub struct FileDownload {
    pub metadata: FileMetadata,
    pub file: File,
}

/// What [`SyncCore::delete_all`] removed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub texts_removed: usize,
    pub files_removed: usize,
    pub directory_removed: bool,
}

/// Size and lifetime limits in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    pub max_upload_bytes: u64,
    pub max_text_bytes: u64,
    pub ttl: Duration,
}

pub struct SyncCore<S = StoreClient> {
    store: Arc<S>,
    registry: AddressRegistry<S>,
    content: ContentIndex<S>,
    blobs: BlobStore,
    config: Config,
}

impl SyncCore<StoreClient> {
    /// Connects a [`StoreClient`] to the database under `config.data_dir`.
    pub fn open(config: Config) -> Result<Self, SyncError> {
        let client = StoreClient::connect_to(config.db_path())?;
        Ok(Self::with_store(Arc::new(client), config))
    }

    pub fn client(&self) -> &StoreClient {
        &self.store
    }
}

impl<S: KvStore> SyncCore<S> {
    pub fn with_store(store: Arc<S>, config: Config) -> Self {
        let registry =
            AddressRegistry::new(Arc::clone(&store), config.ttl, config.address.clone());
        let content =
            ContentIndex::new(Arc::clone(&store), config.ttl, config.max_text_bytes);
        let blobs = BlobStore::new(config.upload_dir.clone(), config.incoming_path());

        Self {
            store,
            registry,
            content,
            blobs,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_upload_bytes: self.config.max_upload_bytes,
            max_text_bytes: self.config.max_text_bytes,
            ttl: self.config.ttl,
        }
    }

    pub fn registry(&self) -> &AddressRegistry<S> {
        &self.registry
    }

    pub fn content(&self) -> &ContentIndex<S> {
        &self.content
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Renews a live address and, if configured, its entries.
    fn require(&self, address: &Address, now: SystemTime) -> Result<AddressRecord, SyncError> {
        let record = self
            .registry
            .touch(address, now)?
            .ok_or(SyncError::NotFound(NotFoundKind::Address))?;

        if self.config.renew_entries_on_touch {
            self.content.renew_entries(address, now)?;
        }
        Ok(record)
    }
}

/// Address operations.
impl<S: KvStore> SyncCore<S> {
    pub fn generate_random_address(&self, now: SystemTime) -> Result<AddressRecord, SyncError> {
        self.registry.allocate_random(now)
    }

    pub fn create_custom_address(
        &self,
        token: &str,
        now: SystemTime,
    ) -> Result<AddressRecord, SyncError> {
        self.registry.create_custom(token, now)
    }

    /// Reports whether the address is live. A live address is touched.
    pub fn check_address_status(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<AddressStatus, SyncError> {
        match self.require(address, now) {
            Ok(record) => Ok(AddressStatus {
                exists: true,
                record: Some(record),
            }),
            Err(SyncError::NotFound(NotFoundKind::Address)) => Ok(AddressStatus {
                exists: false,
                record: None,
            }),
            Err(e) => Err(e),
        }
    }
}

/// Text operations.
impl<S: KvStore> SyncCore<S> {
    pub fn save_text(
        &self,
        address: &Address,
        content: &str,
        now: SystemTime,
    ) -> Result<TextEntry, SyncError> {
        self.require(address, now)?;
        self.content.save_text(address, content, now)
    }

    /// Newest first.
    pub fn list_texts(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<TextEntry>, SyncError> {
        self.require(address, now)?;
        self.content.list_texts(address, now)
    }

    pub fn get_text(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<TextEntry, SyncError> {
        self.require(address, now)?;
        self.content
            .get_text(address, id, now)?
            .ok_or(SyncError::NotFound(NotFoundKind::Text))
    }

    /// Idempotent once the address is live.
    pub fn delete_text(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<(), SyncError> {
        self.require(address, now)?;
        self.content.delete_text(address, id, now)?;
        Ok(())
    }
}

/// File operations.
impl<S: KvStore> SyncCore<S> {
    /// Commits an upload that is already on disk at `temp_path`. An oversized
    /// upload is rejected and left where it is.
    ///
    /// The blob is moved first and the metadata written second. If the move
    /// fails nothing is recorded; if the metadata write fails the blob is
    /// removed again.
    pub fn upload_file(
        &self,
        address: &Address,
        temp_path: &Path,
        upload: FileUpload,
        now: SystemTime,
    ) -> Result<FileMetadata, SyncError> {
        self.require(address, now)?;

        let size = std::fs::metadata(temp_path)
            .map_err(|_| BlobStoreError::MissingUpload(temp_path.to_path_buf()))?
            .len();
        if size > self.config.max_upload_bytes {
            return Err(BlobStoreError::TooLarge {
                limit: self.config.max_upload_bytes,
            }
            .into());
        }

        self.commit_upload(address, temp_path, size, upload, now)
    }

    /// Receives an upload from a byte stream, then commits it like
    /// [`upload_file`](Self::upload_file).
    pub fn upload_reader(
        &self,
        address: &Address,
        reader: impl Read,
        upload: FileUpload,
        now: SystemTime,
    ) -> Result<FileMetadata, SyncError> {
        self.require(address, now)?;

        let (temp_path, size) = self.blobs.spool(reader, self.config.max_upload_bytes)?;
        let result = self.commit_upload(address, &temp_path, size, upload, now);
        if result.is_err() {
            self.blobs.remove_upload(&temp_path);
        }
        result
    }

    fn commit_upload(
        &self,
        address: &Address,
        temp_path: &Path,
        size: u64,
        upload: FileUpload,
        now: SystemTime,
    ) -> Result<FileMetadata, SyncError> {
        let id = generator::generate_file_id();
        let original_name = generator::repair_filename_encoding(&upload.original_name);
        let filename = blob_store::stored_filename(&id, &original_name);

        let path = self.blobs.save_blob(address, temp_path, &filename)?;

        let metadata = FileMetadata {
            id,
            address: address.clone(),
            filename,
            original_name,
            mime_type: upload.mime_type,
            size,
            path: path.clone(),
            created_at: now,
        };

        match self.content.save_file_metadata(metadata, now) {
            Ok(metadata) => {
                info!(address = %address, id = %metadata.id, size, "file uploaded");
                Ok(metadata)
            }
            Err(e) => {
                self.blobs.delete_blob(&path);
                Err(e)
            }
        }
    }

    /// Opens a stored file. Fails with `NotFound` if either the metadata or
    /// the blob is missing.
    pub fn download_file(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<FileDownload, SyncError> {
        self.require(address, now)?;

        let metadata = self
            .content
            .get_file_metadata(address, id, now)?
            .ok_or(SyncError::NotFound(NotFoundKind::File))?;
        if !self.blobs.blob_exists(&metadata.path) {
            return Err(SyncError::NotFound(NotFoundKind::Blob));
        }

        let file = self.blobs.open_blob(&metadata.path)?;
        Ok(FileDownload { metadata, file })
    }

    /// Newest first.
    pub fn list_files(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<FileMetadata>, SyncError> {
        self.require(address, now)?;
        self.content.list_files(address, now)
    }

    /// Texts and files merged, newest first.
    pub fn list_items(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<Vec<TransferItem>, SyncError> {
        self.require(address, now)?;

        let texts = self.content.list_texts(address, now)?;
        let files = self.content.list_files(address, now)?;

        let mut items: Vec<TransferItem> = texts
            .iter()
            .map(TransferItem::from)
            .chain(files.iter().map(TransferItem::from))
            .collect();
        items.sort_by_key(|item| std::cmp::Reverse(item.created_at));
        Ok(items)
    }

    /// Removes the blob best-effort, then the metadata. Idempotent once the
    /// address is live.
    pub fn delete_file(
        &self,
        address: &Address,
        id: &str,
        now: SystemTime,
    ) -> Result<(), SyncError> {
        self.require(address, now)?;

        if let Some(metadata) = self.content.get_file_metadata(address, id, now)? {
            self.blobs.delete_blob(&metadata.path);
            self.content.delete_file_metadata(address, id, now)?;
            debug!(address = %address, id = %id, "file deleted");
        }
        Ok(())
    }
}

/// Teardown and maintenance.
impl<S: KvStore> SyncCore<S> {
    /// Deletes texts, file metadata, the blob directory and finally the
    /// address record. Idempotent; the address does not need to be live.
    pub fn delete_all(
        &self,
        address: &Address,
        now: SystemTime,
    ) -> Result<DeleteSummary, SyncError> {
        let texts = self.content.delete_all_texts(address, now)?;
        let files = self.content.delete_all_file_metadata(address, now)?;
        let directory_removed = self.blobs.delete_address_directory(address);
        self.registry.delete(address, now)?;

        let summary = DeleteSummary {
            texts_removed: texts.len(),
            files_removed: files.len(),
            directory_removed,
        };
        info!(
            address = %address,
            texts = summary.texts_removed,
            files = summary.files_removed,
            "address data deleted"
        );
        Ok(summary)
    }

    pub fn expiry_sweep(&self) -> ExpirySweep<S> {
        ExpirySweep::new(
            Arc::clone(&self.store),
            self.registry.clone(),
            self.content.clone(),
            self.blobs.clone(),
            self.config.sweep_interval,
        )
    }

    pub fn sweep(&self, now: SystemTime) -> Result<SweepOutcome, SyncError> {
        self.expiry_sweep().run(now)
    }

    pub fn should_run_sweep(&self, now: SystemTime) -> bool {
        self.expiry_sweep().should_run(now, self.config.sweep_interval)
    }
}

impl<S: KvStore + 'static> SyncCore<S> {
    /// Starts a background sweep every `config.sweep_interval`.
    pub fn spawn_sweep_worker(&self) -> SweepWorker {
        SweepWorker::spawn(self.expiry_sweep(), self.config.sweep_interval)
    }
}
