//! Bookkeeping persisted alongside the data it describes.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Store key holding [`SweepMetadata`] as JSON.
pub(crate) const SWEEP_METADATA_KEY: &str = "meta:sweep";

/// Expiry sweep metadata. Missing fields default to None.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepMetadata {
    #[serde(default)]
    pub last_run_at: Option<SystemTime>,
}
