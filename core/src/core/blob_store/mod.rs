//! On-disk placement of uploaded bytes, one directory per address.
//!
//! Layout under the upload root:
//! - `{address}/{id}-{sanitized name}`: committed blobs
//! - `.incoming/{random}.part`: uploads still being received
//!
//! Blob lifetime is independent of the metadata in the store. Removal helpers
//! are best-effort: failures are logged and reported as `false`.

use crate::core::generator::{self, MAX_FILENAME_CHARS};
use crate::types::Address;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

pub mod error {
    use std::path::PathBuf;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum BlobStoreError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Upload not found: {}", .0.display())]
        MissingUpload(PathBuf),

        #[error("Upload exceeds the {limit} byte limit")]
        TooLarge { limit: u64 },
    }
}

use error::BlobStoreError;

/// Extension of spooled uploads.
const PART_EXTENSION: &str = "part";

/// Name a blob is stored under: `{id}-{sanitized original}`, at most
/// [`MAX_FILENAME_CHARS`] bytes so it fits common filesystem limits.
pub fn stored_filename(id: &str, original_name: &str) -> String {
    let mut name = format!("{id}-{}", generator::sanitize_filename(original_name));
    if name.len() > MAX_FILENAME_CHARS {
        let mut end = MAX_FILENAME_CHARS;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

/// Recovers the file id from a stored blob name.
fn id_of(filename: &str) -> Option<&str> {
    filename
        .split_once('-')
        .map(|(id, _)| id)
        .filter(|id| !id.is_empty())
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    incoming: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>, incoming: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            incoming: incoming.into(),
        }
    }

    pub fn address_dir(&self, address: &Address) -> PathBuf {
        self.root.join(address.as_str())
    }
}

/// Directory operations.
impl BlobStore {
    pub fn ensure_directory(&self, address: &Address) -> Result<PathBuf, BlobStoreError> {
        let dir = self.address_dir(address);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Recursively removes the address directory. Returns `true` if it existed
    /// and is now gone.
    pub fn delete_address_directory(&self, address: &Address) -> bool {
        let dir = self.address_dir(address);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(address = %address, "blob directory removed");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(address = %address, path = %dir.display(), error = %e, "failed to remove blob directory");
                false
            }
        }
    }

    /// Addresses that currently have a directory. Entries that are not valid
    /// addresses (such as the incoming spool) are skipped.
    pub fn list_address_dirs(&self) -> Result<Vec<Address>, BlobStoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut addresses = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
                && let Ok(address) = Address::try_from(name)
            {
                addresses.push(address);
            }
        }

        Ok(addresses)
    }
}

/// Blob operations.
impl BlobStore {
    /// Moves an already-received upload into the address directory.
    ///
    /// This is a rename, so it fails instead of copying when the upload is
    /// missing. Returns the final blob path.
    pub fn save_blob(
        &self,
        address: &Address,
        temp_path: &Path,
        filename: &str,
    ) -> Result<PathBuf, BlobStoreError> {
        if !temp_path.is_file() {
            return Err(BlobStoreError::MissingUpload(temp_path.to_path_buf()));
        }

        let dest = self.ensure_directory(address)?.join(filename);
        std::fs::rename(temp_path, &dest).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BlobStoreError::MissingUpload(temp_path.to_path_buf()),
            _ => BlobStoreError::Io(e),
        })?;

        debug!(address = %address, path = %dest.display(), "blob committed");
        Ok(dest)
    }

    pub fn blob_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    pub fn open_blob(&self, path: &Path) -> Result<File, BlobStoreError> {
        Ok(File::open(path)?)
    }

    /// Best-effort unlink. Returns `true` if the file was removed.
    pub fn delete_blob(&self, path: &Path) -> bool {
        match std::fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove blob");
                false
            }
        }
    }

    /// Committed blobs of an address as `(file id, path)`.
    pub fn list_blobs(&self, address: &Address) -> Result<Vec<(String, PathBuf)>, BlobStoreError> {
        let dir = self.address_dir(address);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut blobs = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file()
                && let Some(id) = path.file_name().and_then(|n| n.to_str()).and_then(id_of)
            {
                blobs.push((id.to_string(), path.clone()));
            }
        }

        Ok(blobs)
    }
}

/// Upload spooling.
impl BlobStore {
    /// Copies `reader` into a fresh file in the incoming spool, failing with
    /// [`BlobStoreError::TooLarge`] once more than `limit` bytes arrive.
    /// The partial file is removed on any failure.
    pub fn spool(&self, reader: impl Read, limit: u64) -> Result<(PathBuf, u64), BlobStoreError> {
        std::fs::create_dir_all(&self.incoming)?;
        let path = self
            .incoming
            .join(generator::generate_file_id())
            .with_extension(PART_EXTENSION);

        match Self::copy_bounded(reader, &path, limit) {
            Ok(size) => Ok((path, size)),
            Err(e) => {
                self.remove_upload(&path);
                Err(e)
            }
        }
    }

    fn copy_bounded(reader: impl Read, path: &Path, limit: u64) -> Result<u64, BlobStoreError> {
        let mut file = File::create(path)?;
        let written = io::copy(&mut reader.take(limit.saturating_add(1)), &mut file)?;
        if written > limit {
            return Err(BlobStoreError::TooLarge { limit });
        }
        file.sync_all()?;
        Ok(written)
    }

    /// Spooled uploads last modified before `cutoff`.
    pub fn stale_uploads(&self, cutoff: SystemTime) -> Result<Vec<PathBuf>, BlobStoreError> {
        if !self.incoming.exists() {
            return Ok(Vec::new());
        }

        let mut stale = Vec::new();
        for entry in std::fs::read_dir(&self.incoming)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() && metadata.modified()? < cutoff {
                stale.push(entry.path());
            }
        }

        Ok(stale)
    }

    /// Best-effort removal of a spooled upload.
    pub fn remove_upload(&self, path: &Path) -> bool {
        self.delete_blob(path)
    }
}
