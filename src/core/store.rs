//! File store over a formatted partition
//!
//! Owns the block map, the partition image, the namespace of stored contents
//! and at most one open [`FileRecord`]. Writes drive the allocator: a file
//! always owns exactly `ceil(size / block_size)` contiguous blocks, and its
//! bytes are mirrored into the partition at the start of that extent.

use crate::core::allocator::bitmap::{BlockMap, UsageMap};
use crate::core::allocator::extent::Extent;
use crate::core::allocator::BlockAllocator;
use crate::core::config::StoreConfig;
use crate::core::error::{Result, StoreError};
use crate::core::io::PartitionStore;
use crate::core::namespace::{validate_name, HostNamespace, Namespace};
use crate::core::record::{FileRecord, SeekBase};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// What [`FileStore::open`] does when the name does not exist yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    Create,
    Fail,
}

/// Path taken by [`FileStore::move_file`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStrategy {
    /// The namespace rename succeeded
    Renamed,
    /// Rename failed; the content was copied and the source removed
    CopiedAndRemoved,
}

/// Block usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_blocks: usize,
    pub free_blocks: usize,
    pub used_blocks: usize,
    pub fragmentation: f64,
}

/// Block-allocated file store
pub struct FileStore<N: Namespace = HostNamespace> {
    config: StoreConfig,
    namespace: N,
    partition: PartitionStore,
    blocks: BlockMap,
    handle: Option<FileRecord>,
}

impl FileStore<HostNamespace> {
    /// Format a store whose entries live as host files under `root`
    pub fn format_at<P: AsRef<Path>>(root: P, config: StoreConfig) -> Result<Self> {
        Self::format(HostNamespace::new(root), config)
    }
}

impl<N: Namespace> FileStore<N> {
    /// Format the partition image and start with every block free
    pub fn format(namespace: N, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        validate_name(&config.partition_name)?;

        let partition = PartitionStore::format(
            namespace.locate(&config.partition_name),
            config.partition_size,
        )?;

        info!(
            partition = %config.partition_name,
            capacity = config.partition_size,
            block_size = config.block_size,
            blocks = config.total_blocks(),
            "Formatted partition"
        );

        Ok(FileStore {
            blocks: BlockMap::new(config.total_blocks()),
            config,
            namespace,
            partition,
            handle: None,
        })
    }

    /// Format the same image again
    ///
    /// Drops the open handle without touching its stored content and resets
    /// every block to free. On failure the store is left as it was.
    pub fn reformat(&mut self) -> Result<()> {
        let partition = PartitionStore::format(
            self.partition.path().to_path_buf(),
            self.config.partition_size,
        )?;

        self.partition = partition;
        self.blocks = BlockMap::new(self.config.total_blocks());
        if let Some(record) = self.handle.take() {
            debug!(file = %record.name(), "Dropped open handle on reformat");
        }

        info!(partition = %self.config.partition_name, "Reformatted partition");
        Ok(())
    }

    /// Open `name`, creating it when missing per `on_missing`
    pub fn open(&mut self, name: &str, on_missing: OnMissing) -> Result<&FileRecord> {
        self.open_with(name, |_| on_missing == OnMissing::Create)
    }

    /// Open `name`, asking `confirm_create` whether to create it when missing
    ///
    /// Any previously open handle is closed first. Declining creation yields
    /// `NotFound`. An existing file is loaded whole and gets a fresh extent
    /// sized to its content; a new file starts empty with no blocks.
    pub fn open_with<F>(&mut self, name: &str, confirm_create: F) -> Result<&FileRecord>
    where
        F: FnOnce(&str) -> bool,
    {
        self.check_entry_name(name)?;
        self.close_handle()?;

        let record = if self.namespace.exists(name)? {
            let data = self.namespace.read_all(name)?;
            let needed = self.config.blocks_for(data.len() as u64);
            let extent = if needed == 0 {
                Extent::empty()
            } else {
                self.blocks.allocate(needed)?
            };

            if let Err(err) = self.mirror(extent, 0, &data) {
                self.blocks.release(extent)?;
                return Err(err);
            }

            FileRecord::new(name, data, extent)
        } else {
            if !confirm_create(name) {
                return Err(StoreError::NotFound(name.to_string()));
            }
            self.namespace.create(name)?;
            FileRecord::new(name, Vec::new(), Extent::empty())
        };

        debug!(
            file = %name,
            size = record.size(),
            block_start = record.block_start(),
            blocks = record.blocks_count(),
            "Opened file"
        );
        let record = self.handle.insert(record);
        Ok(&*record)
    }

    /// Close the open handle, releasing its blocks; stored content persists
    pub fn close(&mut self) -> Result<()> {
        if self.handle.is_none() {
            return Err(StoreError::no_open_file());
        }
        self.close_handle()
    }

    fn close_handle(&mut self) -> Result<()> {
        if let Some(record) = self.handle.take() {
            self.blocks.release(record.extent())?;
            debug!(file = %record.name(), "Closed file");
        }
        Ok(())
    }

    /// Write `bytes` at the cursor, growing the file and its extent as needed
    ///
    /// On any failure the record's size, cursor and extent are unchanged.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Err(StoreError::InvalidArgument(
                "write length must be at least 1 byte".to_string(),
            ));
        }

        let record = self.handle.as_ref().ok_or_else(StoreError::no_open_file)?;
        let old_extent = record.extent();
        let cursor = record.cursor();
        let needed = self
            .config
            .blocks_for(record.size_after_write(bytes.len()));

        let relocated = needed > old_extent.length;
        let extent = if relocated {
            self.regrow(old_extent, needed)?
        } else {
            old_extent
        };

        if let Err(err) = self.commit_write(extent, relocated, cursor, bytes) {
            self.rollback_write(extent, old_extent, bytes.len());
            return Err(err);
        }

        let record = self.handle.as_mut().ok_or_else(StoreError::no_open_file)?;
        record.apply_write(bytes, extent);
        if relocated {
            debug!(
                file = %record.name(),
                from = ?old_extent,
                to = ?extent,
                "Relocated file extent"
            );
        }
        Ok(bytes.len())
    }

    /// Swap `old` for a first-fit run of `needed` blocks, restoring `old` on failure
    fn regrow(&mut self, old: Extent, needed: usize) -> Result<Extent> {
        self.blocks.release(old)?;
        match self.blocks.allocate(needed) {
            Ok(extent) => Ok(extent),
            Err(err) => {
                self.blocks.reserve(old)?;
                Err(err)
            }
        }
    }

    /// Mirror the write into the partition, then persist it in the namespace
    fn commit_write(
        &mut self,
        extent: Extent,
        relocated: bool,
        cursor: u64,
        bytes: &[u8],
    ) -> Result<()> {
        let record = self.handle.as_ref().ok_or_else(StoreError::no_open_file)?;
        let base = extent.byte_offset(self.config.block_size);

        if relocated && record.size() > 0 {
            self.partition.write_at(base, record.data())?;
        }
        self.partition.write_at(base + cursor, bytes)?;

        self.namespace.write_at(record.name(), cursor, bytes)
    }

    /// Put the allocation, partition mirror and stored content back to the
    /// pre-write state
    ///
    /// Best effort: failures are logged so the caller still sees the error
    /// that aborted the write.
    fn rollback_write(&mut self, attempted: Extent, old: Extent, written_len: usize) {
        if attempted != old {
            if let Err(err) = self
                .blocks
                .release(attempted)
                .and_then(|()| self.blocks.reserve(old))
            {
                error!(from = ?attempted, to = ?old, error = %err, "Could not restore extent");
            }
        }

        let Some(record) = self.handle.as_ref() else {
            return;
        };
        let data = record.data();

        if !data.is_empty() {
            let base = old.byte_offset(self.config.block_size);
            if let Err(err) = self.partition.write_at(base, data) {
                warn!(file = %record.name(), error = %err, "Could not restore partition mirror");
            }
        }

        // The stored entry may hold part of the new bytes or extend past the
        // old size; cut it back and rewrite the overwritten range
        let cursor = record.cursor() as usize;
        let overwritten = &data[cursor.min(data.len())..(cursor + written_len).min(data.len())];
        let restored = self
            .namespace
            .truncate(record.name(), record.size())
            .and_then(|()| {
                if overwritten.is_empty() {
                    Ok(())
                } else {
                    self.namespace
                        .write_at(record.name(), cursor as u64, overwritten)
                }
            });
        if let Err(err) = restored {
            warn!(file = %record.name(), error = %err, "Could not restore stored content");
        }
    }

    fn mirror(&mut self, extent: Extent, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let base = extent.byte_offset(self.config.block_size);
        self.partition.write_at(base + offset, data)?;
        Ok(())
    }

    /// Read up to `max_len` bytes from the cursor
    ///
    /// Returns fewer bytes (possibly none) at end of content.
    pub fn read(&mut self, max_len: usize) -> Result<Vec<u8>> {
        if max_len == 0 {
            return Err(StoreError::InvalidArgument(
                "read length must be at least 1 byte".to_string(),
            ));
        }
        let record = self.handle.as_mut().ok_or_else(StoreError::no_open_file)?;
        Ok(record.read(max_len))
    }

    /// Move the cursor; the result is clamped to `[0, size]`
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let record = self.handle.as_mut().ok_or_else(StoreError::no_open_file)?;
        Ok(record.seek(pos))
    }

    /// Seek from a raw `(offset, base)` pair, base 0/1/2 = start/current/end
    pub fn seek_raw(&mut self, offset: i64, base: i32) -> Result<u64> {
        let base = SeekBase::try_from(base)?;
        self.seek(base.with_offset(offset))
    }

    /// Size of the open file
    pub fn size(&self) -> Result<u64> {
        self.handle
            .as_ref()
            .map(FileRecord::size)
            .ok_or_else(StoreError::no_open_file)
    }

    /// Delete the open file: release its blocks, remove its stored content
    /// and drop the handle
    ///
    /// Release and teardown happen even when the removal fails.
    pub fn delete(&mut self) -> Result<()> {
        let record = self.handle.take().ok_or_else(StoreError::no_open_file)?;

        let released = self.blocks.release(record.extent());
        let removed = self.namespace.remove(record.name());

        match &removed {
            Ok(()) => debug!(file = %record.name(), "Deleted file"),
            Err(err) => warn!(file = %record.name(), error = %err, "Could not remove stored content"),
        }

        released?;
        removed
    }

    /// Copy the stored content of `src` into `dst`
    ///
    /// Neither needs to be open. Returns the number of bytes copied.
    pub fn copy_file(&mut self, src: &str, dst: &str) -> Result<u64> {
        self.check_transfer(src, dst)?;
        let copied = self.namespace.copy(src, dst)?;
        debug!(src = %src, dst = %dst, bytes = copied, "Copied file");
        Ok(copied)
    }

    /// Rename the entry `old` to `new`; an open handle on `old` follows it
    pub fn rename_file(&mut self, old: &str, new: &str) -> Result<()> {
        self.check_transfer(old, new)?;
        self.namespace.rename(old, new)?;
        self.follow_rename(old, new);
        debug!(old = %old, new = %new, "Renamed file");
        Ok(())
    }

    /// Move `src` to `dst`: rename, or copy then remove the source
    ///
    /// Fails only if both paths fail. The source is removed only after a
    /// complete copy.
    pub fn move_file(&mut self, src: &str, dst: &str) -> Result<MoveStrategy> {
        self.check_transfer(src, dst)?;

        match self.namespace.rename(src, dst) {
            Ok(()) => {
                self.follow_rename(src, dst);
                debug!(src = %src, dst = %dst, "Moved file by rename");
                Ok(MoveStrategy::Renamed)
            }
            Err(rename_err) => {
                warn!(
                    src = %src,
                    dst = %dst,
                    error = %rename_err,
                    "Rename failed, falling back to copy and remove"
                );
                self.namespace.copy(src, dst)?;
                self.namespace.remove(src)?;
                self.follow_rename(src, dst);
                debug!(src = %src, dst = %dst, "Moved file by copy and remove");
                Ok(MoveStrategy::CopiedAndRemoved)
            }
        }
    }

    fn follow_rename(&mut self, old: &str, new: &str) {
        if let Some(record) = self.handle.as_mut() {
            if record.name() == old {
                record.set_name(new);
            }
        }
    }

    /// Whether a stored entry named `name` exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        self.namespace.exists(name)
    }

    /// The open handle, if any
    pub fn handle(&self) -> Option<&FileRecord> {
        self.handle.as_ref()
    }

    /// Per-block usage snapshot
    pub fn visualize(&self) -> UsageMap {
        self.blocks.visualize()
    }

    /// Read-only access to the block map
    pub fn block_map(&self) -> &BlockMap {
        &self.blocks
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_blocks: self.blocks.total_blocks(),
            free_blocks: self.blocks.free_blocks(),
            used_blocks: self.blocks.used_blocks(),
            fragmentation: self.blocks.fragmentation_score(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn namespace(&self) -> &N {
        &self.namespace
    }

    /// Raw bytes of the partition image
    pub fn read_partition(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        self.partition.read_at(offset, length)
    }

    /// Flush the partition image to disk
    pub fn sync(&mut self) -> Result<()> {
        self.partition.sync()
    }

    /// Verify that the used blocks are exactly the open file's extent, that
    /// the extent is sized to the content, and that the partition mirrors it
    pub fn check_consistency(&mut self) -> Result<()> {
        let extent = self.handle.as_ref().map(FileRecord::extent).unwrap_or_default();

        let used = self.blocks.used_indices();
        if !used.iter().copied().eq(extent.blocks()) {
            return Err(StoreError::AllocationInconsistency {
                start: extent.start,
                length: extent.length,
                reason: format!(
                    "{} used blocks do not match the open file's extent",
                    used.len()
                ),
            });
        }

        let Some(record) = self.handle.as_ref() else {
            return Ok(());
        };

        if extent.length != self.config.blocks_for(record.size()) {
            return Err(StoreError::AllocationInconsistency {
                start: extent.start,
                length: extent.length,
                reason: format!("extent is not sized for {} bytes", record.size()),
            });
        }

        if !record.data().is_empty() {
            let base = extent.byte_offset(self.config.block_size);
            let mirrored = self.partition.read_at(base, record.data().len())?;
            if mirrored != record.data() {
                return Err(StoreError::AllocationInconsistency {
                    start: extent.start,
                    length: extent.length,
                    reason: "partition content differs from the open file".to_string(),
                });
            }
        }

        Ok(())
    }

    fn check_entry_name(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        if name == self.config.partition_name
            || self.namespace.locate(name) == self.partition.path()
        {
            return Err(StoreError::InvalidArgument(format!(
                "'{}' is the partition image",
                name
            )));
        }
        Ok(())
    }

    /// Names for copy/rename/move: both valid, distinct, and the destination
    /// is neither the partition image nor the open file
    fn check_transfer(&self, src: &str, dst: &str) -> Result<()> {
        self.check_entry_name(src)?;
        self.check_entry_name(dst)?;

        if src == dst {
            return Err(StoreError::InvalidArgument(format!(
                "source and destination are both '{}'",
                src
            )));
        }

        if self.handle.as_ref().is_some_and(|r| r.name() == dst) {
            return Err(StoreError::InvalidArgument(format!(
                "destination '{}' is the open file",
                dst
            )));
        }

        Ok(())
    }
}
