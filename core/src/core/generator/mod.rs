//! Token and name generation. Stateless.

use crate::types::{Address, AddressConfig, MAX_ADDRESS_LENGTH};
use rand::{Rng, RngCore};

/// Alphabet for random addresses.
const ADDRESS_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Upper bound on a sanitized filename, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

/// Random bytes behind a file or text id.
const ID_BYTES: usize = 16;

/// Draws `length` random bytes and maps each into the address alphabet.
/// `length` is clamped to `1..=MAX_ADDRESS_LENGTH`. No collision awareness:
/// the caller checks and retries.
pub fn generate_random(length: usize) -> Address {
    let mut bytes = vec![0u8; length.clamp(1, MAX_ADDRESS_LENGTH)];
    rand::rng().fill_bytes(&mut bytes);

    let token: String = bytes
        .iter()
        .map(|b| ADDRESS_ALPHABET[*b as usize % ADDRESS_ALPHABET.len()] as char)
        .collect();

    // SAFETY: the alphabet is ASCII alphanumeric and the length is clamped
    // to what `Address` accepts.
    unsafe { Address::new_unchecked(token) }
}

/// Checks a caller-chosen token against the configured format.
pub fn validate_custom(token: &str, rules: &AddressConfig) -> bool {
    let len = token.chars().count();
    (rules.min_custom_length..=rules.max_length).contains(&len)
        && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Strips characters that are unsafe in a file name on common filesystems.
///
/// Path separators, reserved symbols and control characters become `_`,
/// runs of `_` collapse, and the result is capped at [`MAX_FILENAME_CHARS`].
/// Letters of any script are kept.
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for c in name.chars() {
        let c = if is_hostile(c) { '_' } else { c };
        if c == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        sanitized.push(c);
    }

    // A name made only of dots would resolve to the directory itself.
    if sanitized.chars().all(|c| c == '.') {
        sanitized = String::from("_");
    }

    sanitized.chars().take(MAX_FILENAME_CHARS).collect()
}

fn is_hostile(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// 16 random bytes as lowercase hex. Collisions are not checked.
pub fn generate_file_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::rng().random();
    hex::encode(bytes)
}

/// Undoes a Latin-1 mis-decoding of a UTF-8 name.
///
/// Byte-oriented upload paths may decode UTF-8 filename bytes one byte per
/// character. If every character fits in a byte and those bytes form valid
/// UTF-8, the UTF-8 reading is returned; otherwise the name is unchanged.
pub fn repair_filename_encoding(name: &str) -> String {
    if name.is_ascii() {
        return name.to_string();
    }

    let bytes: Option<Vec<u8>> = name.chars().map(|c| u8::try_from(c).ok()).collect();

    bytes
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests;
