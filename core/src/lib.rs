pub mod core;
pub mod types;

pub use crate::core::error::{ErrorKind, NotFoundKind, SyncError};
pub use crate::core::{
    AddressStatus, DeleteSummary, FileDownload, FileUpload, Limits, SyncCore,
};
