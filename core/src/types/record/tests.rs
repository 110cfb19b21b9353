use super::codec::error::CodecError;
use super::codec::{decode, encode};
use super::*;
use std::time::Duration;

fn address(s: &str) -> Address {
    Address::try_from(s).unwrap()
}

fn sample_text(owner: &str) -> TextEntry {
    let now = SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
    TextEntry {
        id: "0f1e2d3c".to_string(),
        address: address(owner),
        content: "hello".to_string(),
        created_at: now,
        updated_at: now,
    }
}

mod codec {
    use super::*;

    #[test]
    fn decode_returns_encoded_record() {
        let text = sample_text("room42");
        let bytes = encode(&text).unwrap();

        assert_eq!(bytes[0], TextEntry::VERSION);
        let decoded: TextEntry = decode(&bytes, &address("room42")).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn decode_rejects_empty_value() {
        let result = decode::<TextEntry>(&[], &address("room42"));
        assert!(matches!(result, Err(CodecError::Empty { .. })));
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let mut bytes = encode(&sample_text("room42")).unwrap();
        bytes[0] = 99;

        let result = decode::<TextEntry>(&bytes, &address("room42"));
        assert!(matches!(
            result,
            Err(CodecError::UnsupportedVersion { version: 99, .. })
        ));
    }

    #[test]
    fn decode_rejects_truncated_body() {
        let bytes = encode(&sample_text("room42")).unwrap();

        let result = decode::<TextEntry>(&bytes[..bytes.len() / 2], &address("room42"));
        assert!(matches!(result, Err(CodecError::Malformed { .. })));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = encode(&sample_text("room42")).unwrap();
        bytes.extend_from_slice(&[0, 0, 0]);

        let result = decode::<TextEntry>(&bytes, &address("room42"));
        assert!(matches!(
            result,
            Err(CodecError::TrailingBytes { count: 3, .. })
        ));
    }

    #[test]
    fn decode_rejects_record_of_other_address() {
        let bytes = encode(&sample_text("room42")).unwrap();

        let result = decode::<TextEntry>(&bytes, &address("other1"));
        assert!(matches!(result, Err(CodecError::AddressMismatch { .. })));
    }

    #[test]
    fn decode_rejects_other_record_type_bytes() {
        let record = AddressRecord {
            address: address("room42"),
            created_at: SystemTime::UNIX_EPOCH,
            last_accessed_at: SystemTime::UNIX_EPOCH,
            expires_at: SystemTime::UNIX_EPOCH,
            is_custom: true,
        };
        let bytes = encode(&record).unwrap();

        assert!(decode::<FileMetadata>(&bytes, &address("room42")).is_err());
    }
}

mod transfer_item {
    use super::*;

    #[test]
    fn text_preview_is_truncated_by_characters() {
        let mut text = sample_text("room42");
        text.content = "字".repeat(TEXT_PREVIEW_LENGTH + 20);

        let item = TransferItem::from(&text);
        let TransferItemKind::Text { preview } = item.kind else {
            panic!("expected text item");
        };
        assert_eq!(preview.chars().count(), TEXT_PREVIEW_LENGTH);
    }

    #[test]
    fn file_item_uses_original_name() {
        let file = FileMetadata {
            id: "abcd".to_string(),
            address: address("room42"),
            filename: "abcd-report.pdf".to_string(),
            original_name: "报告.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size: 12,
            path: PathBuf::from("/tmp/room42/abcd-report.pdf"),
            created_at: SystemTime::UNIX_EPOCH,
        };

        let item = TransferItem::from(&file);
        assert_eq!(
            item.kind,
            TransferItemKind::File {
                filename: "报告.pdf".to_string(),
                size: 12,
                mime_type: "application/pdf".to_string(),
            }
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let item = TransferItem::from(&sample_text("room42"));
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["type"], "text");
        assert_eq!(json["id"], "0f1e2d3c");
        assert_eq!(json["preview"], "hello");
    }
}
