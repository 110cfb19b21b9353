pub(crate) mod address;
pub use address::{Address, AddressError, MAX_ADDRESS_LENGTH};

pub(crate) mod config;
pub use config::{AddressConfig, AppConfig, AppConfigError, Config, LifecycleConfig, StorageConfig};

pub(crate) mod metadata;
pub use metadata::SweepMetadata;

pub(crate) mod record;
pub use record::codec::error::CodecError;
pub use record::{
    AddressRecord, Entry, FileMetadata, Record, TEXT_PREVIEW_LENGTH, TextEntry, TransferItem,
    TransferItemKind,
};

pub(crate) mod ttl_key;
pub use ttl_key::TtlKey;
