use super::Record;
use crate::types::Address;

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum CodecError {
        #[error("Failed to encode {type_name}: {error}")]
        Encode {
            type_name: &'static str,
            error: postcard::Error,
        },

        #[error("Stored {type_name} is empty")]
        Empty { type_name: &'static str },

        #[error("Unsupported {type_name} schema version: {version}")]
        UnsupportedVersion {
            type_name: &'static str,
            version: u8,
        },

        #[error("Malformed {type_name}: {error}")]
        Malformed {
            type_name: &'static str,
            error: postcard::Error,
        },

        #[error("Stored {type_name} has {count} trailing bytes")]
        TrailingBytes {
            type_name: &'static str,
            count: usize,
        },

        #[error("Stored {type_name} belongs to {found}, expected {expected}")]
        AddressMismatch {
            type_name: &'static str,
            expected: String,
            found: String,
        },
    }
}

use error::CodecError;

pub fn encode<R: Record>(record: &R) -> Result<Vec<u8>, CodecError> {
    postcard::to_extend(record, vec![R::VERSION]).map_err(|error| CodecError::Encode {
        type_name: R::TYPE_NAME,
        error,
    })
}

/// Decodes a record and checks it belongs to `expected`.
pub fn decode<R: Record>(data: &[u8], expected: &Address) -> Result<R, CodecError> {
    let (version, body) = data.split_first().ok_or(CodecError::Empty {
        type_name: R::TYPE_NAME,
    })?;

    if *version != R::VERSION {
        return Err(CodecError::UnsupportedVersion {
            type_name: R::TYPE_NAME,
            version: *version,
        });
    }

    let (record, rest) =
        postcard::take_from_bytes::<R>(body).map_err(|error| CodecError::Malformed {
            type_name: R::TYPE_NAME,
            error,
        })?;

    if !rest.is_empty() {
        return Err(CodecError::TrailingBytes {
            type_name: R::TYPE_NAME,
            count: rest.len(),
        });
    }

    if record.address() != expected {
        return Err(CodecError::AddressMismatch {
            type_name: R::TYPE_NAME,
            expected: expected.to_string(),
            found: record.address().to_string(),
        });
    }

    Ok(record)
}
