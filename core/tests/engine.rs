use std::collections::HashSet;
use std::time::Duration;
use syncbox_core::types::{Address, TransferItemKind};
use syncbox_core::{ErrorKind, NotFoundKind, SyncError};

mod common;
use common::*;

/// Verify a fresh custom address exists immediately after creation.
#[test]
fn test_create_custom_then_exists() {
    let (core, _temp) = open_core();
    let now = base_time();

    for token in ["alpha", "Bravo2024", "c0ffee12345678901234"] {
        let record = core.create_custom_address(token, now).unwrap();
        assert!(record.is_custom);
        assert!(
            core.check_address_status(&record.address, now)
                .unwrap()
                .exists
        );
    }
}

/// Verify claiming a taken custom address reports a conflict.
#[test]
fn test_create_custom_twice_conflicts() {
    let (core, _temp) = open_core();
    let now = base_time();
    core.create_custom_address("shared", now).unwrap();

    let err = core.create_custom_address("shared", now).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
}

/// Verify malformed custom addresses are rejected as invalid input.
#[test]
fn test_create_custom_rejects_malformed() {
    let (core, _temp) = open_core();

    for token in ["abcd", "with space", "dash-ed", "ünïcode", ""] {
        let err = core.create_custom_address(token, base_time()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "token {token:?}");
    }
}

/// Verify repeated random generation yields distinct live addresses.
#[test]
fn test_generate_random_addresses_are_distinct() {
    let (core, _temp) = open_core();
    let now = base_time();

    let addresses: HashSet<Address> = (0..200)
        .map(|_| core.generate_random_address(now).unwrap().address)
        .collect();

    assert_eq!(addresses.len(), 200);
}

/// Verify a saved text is listed and retrievable by id.
#[test]
fn test_text_round_trip() {
    let (core, _temp) = open_core();
    let now = base_time();
    let room = core.create_custom_address("texts", now).unwrap().address;

    let saved = core.save_text(&room, "hello", now).unwrap();
    let listed = core.list_texts(&room, now).unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "hello");
    assert_eq!(core.get_text(&room, &saved.id, now).unwrap(), saved);
}

/// Verify deleting a text twice succeeds and leaves it not found.
#[test]
fn test_delete_text_idempotent() {
    let (core, _temp) = open_core();
    let now = base_time();
    let room = core.create_custom_address("texts", now).unwrap().address;
    let saved = core.save_text(&room, "hello", now).unwrap();

    core.delete_text(&room, &saved.id, now).unwrap();
    core.delete_text(&room, &saved.id, now).unwrap();

    let err = core.get_text(&room, &saved.id, now).unwrap_err();
    assert!(matches!(err, SyncError::NotFound(NotFoundKind::Text)));
}

/// Verify texts saved at increasing instants list newest first.
#[test]
fn test_texts_list_newest_first() {
    let (core, _temp) = open_core();
    let t1 = base_time();
    let t2 = t1 + Duration::from_millis(10);
    let t3 = t2 + Duration::from_millis(10);
    let room = core.create_custom_address("order", t1).unwrap().address;

    core.save_text(&room, "t1", t1).unwrap();
    core.save_text(&room, "t2", t2).unwrap();
    core.save_text(&room, "t3", t3).unwrap();

    let contents: Vec<_> = core
        .list_texts(&room, t3)
        .unwrap()
        .into_iter()
        .map(|t| t.content)
        .collect();
    assert_eq!(contents, ["t3", "t2", "t1"]);
}

/// Verify a non-ASCII filename survives upload and download with identical bytes.
#[test]
fn test_upload_download_non_ascii_name() {
    let (core, temp) = open_core();
    let now = base_time();
    let room = core.create_custom_address("files", now).unwrap().address;
    let body: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let temp_path = write_temp(&temp, "part.tmp", &body);

    let saved = core
        .upload_file(&room, &temp_path, upload("报告.pdf", "application/pdf"), now)
        .unwrap();
    let download = core.download_file(&room, &saved.id, now).unwrap();

    assert_eq!(download.metadata.original_name, "报告.pdf");
    assert_eq!(download.metadata.mime_type, "application/pdf");
    assert_eq!(read_download(download), body);
}

/// Verify a filename mis-decoded as Latin-1 by the transport is repaired.
#[test]
fn test_upload_repairs_misdecoded_name() {
    let (core, _temp) = open_core();
    let now = base_time();
    let room = core.create_custom_address("files", now).unwrap().address;
    let garbled: String = "报告.pdf".bytes().map(char::from).collect();

    let saved = core
        .upload_reader(&room, &b"%PDF"[..], upload(&garbled, "application/pdf"), now)
        .unwrap();

    assert_eq!(saved.original_name, "报告.pdf");
    assert_eq!(saved.filename, format!("{}-报告.pdf", saved.id));
}

/// Verify the name repair runs once, so a name that is still mis-decoded
/// after one pass is kept as that pass left it.
#[test]
fn test_upload_repairs_name_exactly_once() {
    use syncbox_core::core::generator::repair_filename_encoding;

    let (core, _temp) = open_core();
    let now = base_time();
    let room = core.create_custom_address("files", now).unwrap().address;
    let twice_garbled: String = "Ã©.txt".bytes().map(char::from).collect();
    let one_pass = repair_filename_encoding(&twice_garbled);
    assert_eq!(one_pass, "Ã©.txt");

    let saved = core
        .upload_reader(&room, &b"data"[..], upload(&twice_garbled, "text/plain"), now)
        .unwrap();

    assert_eq!(saved.original_name, one_pass);
    assert_eq!(saved.filename, format!("{}-{one_pass}", saved.id));
    let listed = core.list_files(&room, now).unwrap();
    assert_eq!(listed[0].original_name, one_pass);
}

/// Verify deleting all data leaves no files and no address directory.
#[test]
fn test_delete_all_clears_files_and_directory() {
    let (core, temp) = open_core();
    let now = base_time();
    let room = core.create_custom_address("files", now).unwrap().address;
    for i in 0..3 {
        let path = write_temp(&temp, &format!("part{i}.tmp"), b"data");
        core.upload_file(&room, &path, upload(&format!("f{i}.txt"), "text/plain"), now)
            .unwrap();
    }
    let dir = core.blobs().address_dir(&room);
    assert!(dir.exists());

    core.delete_all(&room, now).unwrap();

    assert!(!dir.exists());
    let recreated = core.create_custom_address("files", now).unwrap().address;
    assert!(core.list_files(&recreated, now).unwrap().is_empty());
}

/// Verify touching at later instants strictly extends the expiry.
#[test]
fn test_touch_extends_expiry() {
    let (core, _temp) = open_core();
    let now = base_time();
    let room = core.create_custom_address("touch", now).unwrap().address;

    let first = core
        .check_address_status(&room, now + HOUR)
        .unwrap()
        .record
        .unwrap();
    let second = core
        .check_address_status(&room, now + 2 * HOUR)
        .unwrap()
        .record
        .unwrap();

    assert!(second.expires_at > first.expires_at);
}

/// Verify the merged listing carries both kinds newest first.
#[test]
fn test_list_items_merged() {
    let (core, temp) = open_core();
    let t0 = base_time();
    let room = core.create_custom_address("mixed", t0).unwrap().address;
    let path = write_temp(&temp, "part.tmp", b"12345");

    core.upload_file(&room, &path, upload("doc.txt", "text/plain"), t0)
        .unwrap();
    core.save_text(&room, "note", t0 + HOUR).unwrap();

    let items = core.list_items(&room, t0 + HOUR).unwrap();

    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0].kind, TransferItemKind::Text { preview } if preview == "note"));
    assert!(matches!(&items[1].kind, TransferItemKind::File { size: 5, .. }));

    let json = serde_json::to_value(&items[0]).unwrap();
    assert_eq!(json["type"], "text");
}

/// Verify every operation on a missing address reports address not found.
#[test]
fn test_missing_address_is_distinguishable() {
    let (core, _temp) = open_core();
    let ghost = Address::try_from("nobody").unwrap();
    let now = base_time();

    let err = core.list_items(&ghost, now).unwrap_err();

    assert!(matches!(err, SyncError::NotFound(NotFoundKind::Address)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Verify data survives closing and reopening the engine.
#[test]
fn test_reopen_keeps_data() {
    let temp = tempfile::TempDir::new().unwrap();
    let now = base_time();
    let id = {
        let core = syncbox_core::SyncCore::open(config(&temp)).unwrap();
        let room = core.create_custom_address("durable", now).unwrap().address;
        let id = core.save_text(&room, "persisted", now).unwrap().id;
        core.client().close();
        id
    };

    let core = syncbox_core::SyncCore::open(config(&temp)).unwrap();
    let room = Address::try_from("durable").unwrap();
    assert_eq!(core.get_text(&room, &id, now).unwrap().content, "persisted");
}
