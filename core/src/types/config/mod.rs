mod app;
mod runtime;

pub use app::{AddressConfig, AppConfig, AppConfigError, LifecycleConfig, StorageConfig};
pub use runtime::Config;
