//! Store configuration
//!
//! Partition geometry and the name of the partition image. Loadable from TOML:
//!
//! ```toml
//! partition_name = "disk.img"
//! partition_size = 1048576
//! block_size = 512
//! ```

use crate::core::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default partition capacity (1 MiB)
pub const PARTITION_SIZE: u64 = 1024 * 1024;

/// Default block size in bytes
pub const BLOCK_SIZE: u64 = 512;

/// Default number of blocks tracked by the bitmap
pub const TOTAL_BLOCKS: usize = (PARTITION_SIZE / BLOCK_SIZE) as usize;

/// Default partition image name inside the namespace root
pub const DEFAULT_PARTITION_NAME: &str = "partition.img";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name of the partition image inside the namespace root
    pub partition_name: String,

    /// Partition capacity in bytes
    pub partition_size: u64,

    /// Allocation unit in bytes
    pub block_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            partition_name: DEFAULT_PARTITION_NAME.to_string(),
            partition_size: PARTITION_SIZE,
            block_size: BLOCK_SIZE,
        }
    }
}

impl StoreConfig {
    /// Default geometry with a custom partition image name
    pub fn with_partition_name(name: impl Into<String>) -> Self {
        StoreConfig {
            partition_name: name.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.partition_name.is_empty() {
            return Err(StoreError::Config(
                "partition_name cannot be empty".to_string(),
            ));
        }

        if self.block_size == 0 {
            return Err(StoreError::Config("block_size must be non-zero".to_string()));
        }

        if self.partition_size == 0 || self.partition_size % self.block_size != 0 {
            return Err(StoreError::Config(format!(
                "partition_size {} must be a non-zero multiple of block_size {}",
                self.partition_size, self.block_size
            )));
        }

        Ok(())
    }

    /// Number of blocks in the partition
    pub fn total_blocks(&self) -> usize {
        (self.partition_size / self.block_size) as usize
    }

    /// Blocks needed to hold `size` bytes
    pub fn blocks_for(&self, size: u64) -> usize {
        ((size + self.block_size - 1) / self.block_size) as usize
    }
}
