//! # partfs - Block-Allocated File Store
//!
//! `partfs` simulates a small block-based storage layer on top of a
//! fixed-size partition image:
//!
//! - **Bitmap block map** with deterministic first-fit allocation of
//!   contiguous runs
//! - **Partition image** of fixed capacity (1 MiB, 512-byte blocks by default)
//!   that mirrors every file's bytes at the start of its extent
//! - **Single open handle** with read/write/seek semantics kept consistent with
//!   the blocks the file owns
//! - **Namespace operations**: copy, rename and move with a copy-and-remove
//!   fallback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use partfs::{FileStore, OnMissing, Result, StoreConfig};
//! use std::io::SeekFrom;
//!
//! # fn main() -> Result<()> {
//! let mut store = FileStore::format_at("/tmp/partfs", StoreConfig::default())?;
//!
//! store.open("a.txt", OnMissing::Create)?;
//! store.write(b"hello")?;
//! store.seek(SeekFrom::Start(0))?;
//! assert_eq!(store.read(5)?, b"hello");
//!
//! // One 512-byte block is now in use
//! assert_eq!(store.stats().used_blocks, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Builder
//!
//! ```rust,no_run
//! use partfs::{Result, StoreBuilder};
//!
//! # fn main() -> Result<()> {
//! let store = StoreBuilder::new()
//!     .root("/tmp/partfs")
//!     .partition_name("disk.img")
//!     .block_size(1024)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    allocator::{
        bitmap::{BlockMap, BlockState, UsageMap},
        extent::Extent,
        BlockAllocator,
    },
    config::{StoreConfig, BLOCK_SIZE, PARTITION_SIZE, TOTAL_BLOCKS},
    error::{ErrorKind, Result, StoreError},
    io::PartitionStore,
    namespace::{validate_name, HostNamespace, Namespace},
    record::{FileRecord, SeekBase},
    FileStore, MoveStrategy, OnMissing, StoreStats,
};

use std::path::PathBuf;
use tracing::debug;

/// Builder for a host-backed [`FileStore`]
///
/// Starts from [`StoreConfig::default`] (or a TOML file) and formats the
/// partition image under `root` on [`build`](StoreBuilder::build).
#[derive(Debug, Default)]
pub struct StoreBuilder {
    root: Option<PathBuf>,
    config_file: Option<PathBuf>,
    partition_name: Option<String>,
    partition_size: Option<u64>,
    block_size: Option<u64>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding the partition image and every stored file
    pub fn root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Load the base configuration from a TOML file
    pub fn config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn partition_name<S: Into<String>>(mut self, name: S) -> Self {
        self.partition_name = Some(name.into());
        self
    }

    pub fn partition_size(mut self, bytes: u64) -> Self {
        self.partition_size = Some(bytes);
        self
    }

    pub fn block_size(mut self, bytes: u64) -> Self {
        self.block_size = Some(bytes);
        self
    }

    /// Resolve the configuration without formatting anything
    pub fn config(&self) -> Result<StoreConfig> {
        let mut config = match &self.config_file {
            Some(path) => StoreConfig::from_file(path)?,
            None => StoreConfig::default(),
        };

        if let Some(name) = &self.partition_name {
            config.partition_name = name.clone();
        }
        if let Some(size) = self.partition_size {
            config.partition_size = size;
        }
        if let Some(size) = self.block_size {
            config.block_size = size;
        }

        config.validate()?;
        Ok(config)
    }

    /// Format the partition and return the store
    pub fn build(self) -> Result<FileStore> {
        let config = self.config()?;
        let root = self.root.ok_or_else(|| {
            StoreError::Config("root directory must be set".to_string())
        })?;

        debug!(root = %root.display(), "Building file store");
        FileStore::format_at(root, config)
    }
}
