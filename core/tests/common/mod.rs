#![allow(dead_code)]

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use syncbox_core::types::{AddressConfig, Config};
use syncbox_core::{FileDownload, FileUpload, SyncCore};
use tempfile::TempDir;

pub const HOUR: Duration = Duration::from_secs(60 * 60);
pub const TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn config(temp: &TempDir) -> Config {
    Config {
        data_dir: temp.path().join("data"),
        upload_dir: temp.path().join("uploads"),
        ttl: TTL,
        max_upload_bytes: 1024 * 1024,
        max_text_bytes: 64 * 1024,
        address: AddressConfig::default(),
        renew_entries_on_touch: true,
        sweep_interval: HOUR,
    }
}

pub fn open_core() -> (SyncCore, TempDir) {
    let temp = TempDir::new().unwrap();
    let core = SyncCore::open(config(&temp)).unwrap();
    (core, temp)
}

pub fn base_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

pub fn write_temp(temp: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = temp.path().join(name);
    std::fs::File::create(&path)
        .unwrap()
        .write_all(content)
        .unwrap();
    path
}

pub fn upload(name: &str, mime_type: &str) -> FileUpload {
    FileUpload {
        original_name: name.to_string(),
        mime_type: mime_type.to_string(),
    }
}

pub fn read_download(download: FileDownload) -> Vec<u8> {
    let mut file = download.file;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).unwrap();
    bytes
}
