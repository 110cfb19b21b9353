use nutype::nutype;

/// Hard ceiling on address length. Configured bounds must fit inside it.
pub const MAX_ADDRESS_LENGTH: usize = 64;

/// A shared address token.
///
/// Only ASCII letters and digits are accepted, so an address can be embedded
/// in store keys (`addr:{address}`) and directory names without escaping.
/// Length bounds for custom addresses are enforced by the generator against
/// the configured rules; this type only guarantees the character set.
#[nutype(
    new_unchecked,
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = MAX_ADDRESS_LENGTH,
        predicate = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric())
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        AsRef,
        Deref,
        TryFrom,
        Into,
        Hash,
        Borrow,
        Display,
        Serialize,
        Deserialize,
    )
)]
pub struct Address(String);
