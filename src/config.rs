//! Configuration for discovery runs.
//!
//! One master `ScanConfig` groups the settings of every pass; each
//! sub-config has defaults suitable for multi-gigabyte images, so an empty
//! JSON object is a valid configuration.

use crate::error::{PagehuntError, Result};
use crate::io::DEFAULT_MAX_IMAGE_SIZE;
use crate::paging::Profile;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Master configuration for a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Architecture profile used to decode entries.
    pub profile: Profile,
    /// Image access limits.
    pub io: IoConfig,
    /// Address translator settings.
    pub translator: TranslatorConfig,
    /// Brute-force sweep settings.
    pub sweep: SweepConfig,
    /// Structure graph settings.
    pub graph: GraphConfig,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| PagehuntError::Serialization(format!("config JSON error: {}", e)))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PagehuntError::Serialization(format!("config JSON error: {}", e)))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Largest image that will be mapped (default: 64 GiB).
    pub max_image_size: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Entries kept in the `(table, vaddr)` cache; 0 disables caching (default: 4096).
    pub cache_capacity: usize,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Pages scored per chunk between progress reports (default: 4096 = 16 MiB).
    pub chunk_pages: usize,
    /// Score the pages of a chunk on the rayon pool (default: true).
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            chunk_pages: 4096,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Turn in-image data references into edges to data-page nodes (default: false).
    pub data_page_nodes: bool,
}
