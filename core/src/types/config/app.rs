use crate::types::address::MAX_ADDRESS_LENGTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Operator-facing configuration, persisted as syncbox.toml.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub address: AddressConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    /// Returns the config file path within the given directory.
    pub fn path(dir: &Path) -> PathBuf {
        dir.join("syncbox.toml")
    }

    /// Loads config from a TOML file. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, AppConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), AppConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates config values and returns list of validation errors.
    /// Returns empty vec if config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.storage.max_upload_bytes == 0 {
            errors.push("storage.max_upload_bytes must be at least 1".to_string());
        }
        if self.storage.max_text_bytes == 0 {
            errors.push("storage.max_text_bytes must be at least 1".to_string());
        }

        let address = &self.address;
        if address.random_length == 0 || address.random_length > MAX_ADDRESS_LENGTH {
            errors.push(format!(
                "address.random_length must be between 1 and {MAX_ADDRESS_LENGTH}"
            ));
        }
        if address.max_length == 0 || address.max_length > MAX_ADDRESS_LENGTH {
            errors.push(format!(
                "address.max_length must be between 1 and {MAX_ADDRESS_LENGTH}"
            ));
        }
        if address.min_custom_length == 0 || address.min_custom_length > address.max_length {
            errors.push(
                "address.min_custom_length must be at least 1 and at most address.max_length"
                    .to_string(),
            );
        }

        if self.lifecycle.ttl_hours == 0 {
            errors.push("lifecycle.ttl_hours must be at least 1".to_string());
        }
        if self.lifecycle.sweep_interval_minutes == 0 {
            errors.push("lifecycle.sweep_interval_minutes must be at least 1".to_string());
        }

        errors
    }

    /// Returns a validated config, replacing invalid values with defaults.
    pub fn with_defaults_for_invalid(&self) -> Self {
        let defaults = Self::default();
        let or_default = |value: u64, default: u64| if value == 0 { default } else { value };

        let mut address = self.address.clone();
        if address.random_length == 0 || address.random_length > MAX_ADDRESS_LENGTH {
            address.random_length = defaults.address.random_length;
        }
        if address.max_length == 0 || address.max_length > MAX_ADDRESS_LENGTH {
            address.max_length = defaults.address.max_length;
        }
        if address.min_custom_length == 0 || address.min_custom_length > address.max_length {
            address.min_custom_length = defaults.address.min_custom_length.min(address.max_length);
        }

        Self {
            storage: StorageConfig {
                data_dir: self.storage.data_dir.clone(),
                upload_dir: self.storage.upload_dir.clone(),
                max_upload_bytes: or_default(
                    self.storage.max_upload_bytes,
                    defaults.storage.max_upload_bytes,
                ),
                max_text_bytes: or_default(
                    self.storage.max_text_bytes,
                    defaults.storage.max_text_bytes,
                ),
            },
            address,
            lifecycle: LifecycleConfig {
                ttl_hours: if self.lifecycle.ttl_hours == 0 {
                    defaults.lifecycle.ttl_hours
                } else {
                    self.lifecycle.ttl_hours
                },
                renew_entries_on_touch: self.lifecycle.renew_entries_on_touch,
                sweep_interval_minutes: if self.lifecycle.sweep_interval_minutes == 0 {
                    defaults.lifecycle.sweep_interval_minutes
                } else {
                    self.lifecycle.sweep_interval_minutes
                },
            },
        }
    }
}

/// Where data lives and how large entries may be.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            max_text_bytes: default_max_text_bytes(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_upload_bytes() -> u64 {
    200 * 1024 * 1024
}

fn default_max_text_bytes() -> u64 {
    1024 * 1024
}

/// Address format and allocation rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    #[serde(default = "default_random_length")]
    pub random_length: usize,
    #[serde(default = "default_min_custom_length")]
    pub min_custom_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_collision_retry_max")]
    pub collision_retry_max: u32,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            random_length: default_random_length(),
            min_custom_length: default_min_custom_length(),
            max_length: default_max_length(),
            collision_retry_max: default_collision_retry_max(),
        }
    }
}

fn default_random_length() -> usize {
    8
}

fn default_min_custom_length() -> usize {
    5
}

fn default_max_length() -> usize {
    20
}

fn default_collision_retry_max() -> u32 {
    5
}

/// TTL and sweep settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,
    /// Renew entry TTLs together with the address on every touch.
    #[serde(default = "default_true")]
    pub renew_entries_on_touch: bool,
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            renew_entries_on_touch: true,
            sweep_interval_minutes: default_sweep_interval_minutes(),
        }
    }
}

fn default_ttl_hours() -> u32 {
    24
}

fn default_sweep_interval_minutes() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

/// Errors that can occur when loading or saving config.
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
