//! Records persisted in the key-value store, plus the listing projection.
//!
//! Every stored record is encoded as `[schema version][postcard body]`; see
//! [`codec`].

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

pub(crate) mod codec;

/// Number of characters of text content shown in a listing preview.
pub const TEXT_PREVIEW_LENGTH: usize = 100;

/// A live sharing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub address: Address,
    pub created_at: SystemTime,
    pub last_accessed_at: SystemTime,
    pub expires_at: SystemTime,
    pub is_custom: bool,
}

/// A piece of shared text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEntry {
    pub id: String,
    pub address: Address,
    pub content: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// Describes one uploaded file. `path` points at the blob on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub address: Address,
    /// Storage-safe name of the blob inside the address directory.
    pub filename: String,
    /// User-facing name, Unicode preserved.
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub path: PathBuf,
    pub created_at: SystemTime,
}

/// Unified, read-only view of a text or file entry for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub id: String,
    pub created_at: SystemTime,
    #[serde(flatten)]
    pub kind: TransferItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransferItemKind {
    Text {
        preview: String,
    },
    File {
        filename: String,
        size: u64,
        mime_type: String,
    },
}

impl From<&TextEntry> for TransferItem {
    fn from(text: &TextEntry) -> Self {
        Self {
            id: text.id.clone(),
            created_at: text.created_at,
            kind: TransferItemKind::Text {
                preview: text.content.chars().take(TEXT_PREVIEW_LENGTH).collect(),
            },
        }
    }
}

impl From<&FileMetadata> for TransferItem {
    fn from(file: &FileMetadata) -> Self {
        Self {
            id: file.id.clone(),
            created_at: file.created_at,
            kind: TransferItemKind::File {
                filename: file.original_name.clone(),
                size: file.size,
                mime_type: file.mime_type.clone(),
            },
        }
    }
}

/// A record type with a fixed schema stored under an address.
pub trait Record: Serialize + for<'de> Deserialize<'de> {
    const VERSION: u8;
    const TYPE_NAME: &'static str;

    fn address(&self) -> &Address;
}

/// A record enumerated through a per-address membership set.
pub trait Entry: Record {
    /// Prefix of the item key: `{ITEM_PREFIX}:{address}:{id}`.
    const ITEM_PREFIX: &'static str;
    /// Prefix of the membership set key: `{LIST_PREFIX}:{address}`.
    const LIST_PREFIX: &'static str;

    fn id(&self) -> &str;
    fn created_at(&self) -> SystemTime;
}

impl Record for AddressRecord {
    const VERSION: u8 = 1;
    const TYPE_NAME: &'static str = "AddressRecord";

    fn address(&self) -> &Address {
        &self.address
    }
}

impl Record for TextEntry {
    const VERSION: u8 = 1;
    const TYPE_NAME: &'static str = "TextEntry";

    fn address(&self) -> &Address {
        &self.address
    }
}

impl Entry for TextEntry {
    const ITEM_PREFIX: &'static str = "text";
    const LIST_PREFIX: &'static str = "texts";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

impl Record for FileMetadata {
    const VERSION: u8 = 1;
    const TYPE_NAME: &'static str = "FileMetadata";

    fn address(&self) -> &Address {
        &self.address
    }
}

impl Entry for FileMetadata {
    const ITEM_PREFIX: &'static str = "file";
    const LIST_PREFIX: &'static str = "files";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

#[cfg(test)]
mod tests;
