use redb::TypeName;
use std::cmp::Ordering;
use std::time::{Duration, SystemTime};

/// Entry of the expiry index: the instant a store key elapses, plus the key.
///
/// Ordered by timestamp first so a range scan up to `now` yields every
/// elapsed key, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlKey {
    pub timestamp: SystemTime,
    pub key: String,
}

const TIMESTAMP_WIDTH: usize = 12;

fn extract_duration(data: &[u8]) -> (Duration, &[u8]) {
    let (secs, data) = data
        .split_first_chunk::<8>()
        .expect("ttl key shorter than its timestamp");
    let secs = u64::from_be_bytes(*secs);
    let (nanos, data) = data
        .split_first_chunk::<4>()
        .expect("ttl key shorter than its timestamp");
    let nanos = u32::from_be_bytes(*nanos);

    (Duration::new(secs, nanos), data)
}

impl redb::Key for TtlKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        let (data1_duration, data1) = extract_duration(data1);
        let (data2_duration, data2) = extract_duration(data2);

        data1_duration
            .cmp(&data2_duration)
            .then_with(|| data1.cmp(data2))
    }
}

impl redb::Value for TtlKey {
    type SelfType<'a> = TtlKey;
    type AsBytes<'a> = Vec<u8>;

    fn fixed_width() -> Option<usize> {
        None
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        let (timestamp_since_epoch, data) = extract_duration(data);

        TtlKey {
            timestamp: SystemTime::UNIX_EPOCH + timestamp_since_epoch,
            key: String::from_utf8_lossy(data).into_owned(),
        }
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
    where
        Self: 'b,
    {
        // Instants before the epoch never reach the index; clamp them to it.
        let since_epoch = value
            .timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        let mut bytes = Vec::with_capacity(TIMESTAMP_WIDTH + value.key.len());
        bytes.extend_from_slice(&since_epoch.as_secs().to_be_bytes());
        bytes.extend_from_slice(&since_epoch.subsec_nanos().to_be_bytes());
        bytes.extend_from_slice(value.key.as_bytes());
        bytes
    }

    fn type_name() -> TypeName {
        TypeName::new("syncbox::TtlKey")
    }
}
