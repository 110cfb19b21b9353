use super::{AddressConfig, AppConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for SyncCore initialization.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    /// TTL applied to addresses and entries at write time.
    pub ttl: Duration,
    pub max_upload_bytes: u64,
    pub max_text_bytes: u64,
    pub address: AddressConfig,
    pub renew_entries_on_touch: bool,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("syncbox.redb")
    }

    /// Spool directory for uploads that have not been committed yet.
    /// Lives under the upload root so the final move stays on one volume.
    pub fn incoming_path(&self) -> PathBuf {
        self.upload_dir.join(".incoming")
    }
}

impl From<&AppConfig> for Config {
    fn from(config: &AppConfig) -> Self {
        Self {
            data_dir: config.storage.data_dir.clone(),
            upload_dir: config.storage.upload_dir.clone(),
            ttl: Duration::from_secs(config.lifecycle.ttl_hours as u64 * 60 * 60),
            max_upload_bytes: config.storage.max_upload_bytes,
            max_text_bytes: config.storage.max_text_bytes,
            address: config.address.clone(),
            renew_entries_on_touch: config.lifecycle.renew_entries_on_touch,
            sweep_interval: Duration::from_secs(
                config.lifecycle.sweep_interval_minutes as u64 * 60,
            ),
        }
    }
}
