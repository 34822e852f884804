//! Disk I/O for the partition image

use crate::core::error::{Result, StoreError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Zero-fill chunk used while formatting
const FORMAT_CHUNK: usize = 64 * 1024;

/// Fixed-capacity, disk-backed partition image
#[derive(Debug)]
pub struct PartitionStore {
    file: File,
    path: PathBuf,
    capacity: u64,
}

impl PartitionStore {
    /// Create (or truncate) the image at `path` and zero-fill `capacity` bytes
    pub fn format<P: AsRef<Path>>(path: P, capacity: u64) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let zeros = vec![0u8; FORMAT_CHUNK];
        let mut remaining = capacity;
        while remaining > 0 {
            let chunk = remaining.min(FORMAT_CHUNK as u64) as usize;
            file.write_all(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }
        file.flush()?;

        tracing::debug!(path = %path.as_ref().display(), capacity, "Formatted partition image");

        Ok(PartitionStore {
            file,
            path: path.as_ref().to_path_buf(),
            capacity,
        })
    }

    /// Read `length` bytes starting at `offset`
    pub fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        self.check_bounds(offset, length as u64)?;

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; length];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Write all of `data` at `offset`; a short write is an error
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        self.check_bounds(offset, data.len() as u64)?;

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(data.len())
    }

    fn check_bounds(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(StoreError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity,
            }),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get image path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
