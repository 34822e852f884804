//! In-memory handle for an open file

use crate::core::allocator::extent::Extent;
use crate::core::error::{Result, StoreError};
use std::io::SeekFrom;

/// Reference point for a raw `(offset, base)` seek
///
/// Raw values follow the `lseek` whence numbering: 0 = start, 1 = current, 2 = end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekBase {
    FromStart,
    FromCurrent,
    FromEnd,
}

impl SeekBase {
    /// Combine with an offset into a [`SeekFrom`]
    ///
    /// A negative offset from the start is kept at 0, matching the clamp
    /// applied by [`FileRecord::seek`].
    pub fn with_offset(self, offset: i64) -> SeekFrom {
        match self {
            SeekBase::FromStart => SeekFrom::Start(offset.max(0) as u64),
            SeekBase::FromCurrent => SeekFrom::Current(offset),
            SeekBase::FromEnd => SeekFrom::End(offset),
        }
    }
}

impl TryFrom<i32> for SeekBase {
    type Error = StoreError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(SeekBase::FromStart),
            1 => Ok(SeekBase::FromCurrent),
            2 => Ok(SeekBase::FromEnd),
            other => Err(StoreError::InvalidArgument(format!(
                "invalid seek base {}",
                other
            ))),
        }
    }
}

/// An open file: name, fully buffered content, cursor and the extent it owns
///
/// Invariants: `cursor <= size`, `data.len() == size`, and the extent holds at
/// least `size` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    name: String,
    data: Vec<u8>,
    cursor: u64,
    extent: Extent,
}

impl FileRecord {
    pub(crate) fn new(name: impl Into<String>, data: Vec<u8>, extent: Extent) -> Self {
        FileRecord {
            name: name.into(),
            data,
            cursor: 0,
            extent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical size in bytes
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Buffered content
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Blocks reserved for this file
    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn block_start(&self) -> usize {
        self.extent.start
    }

    pub fn blocks_count(&self) -> usize {
        self.extent.length
    }

    /// Move the cursor, clamping the result to `[0, size]`
    ///
    /// Out-of-range targets are not errors. Returns the new cursor.
    pub fn seek(&mut self, pos: SeekFrom) -> u64 {
        let size = self.size() as i128;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.cursor as i128 + delta as i128,
            SeekFrom::End(delta) => size + delta as i128,
        };

        let clamped = target.clamp(0, size);
        if clamped != target {
            tracing::debug!(
                file = %self.name,
                requested = %target,
                cursor = %clamped,
                "Seek target clamped"
            );
        }

        self.cursor = clamped as u64;
        self.cursor
    }

    /// Copy up to `max_len` bytes from the cursor and advance past them
    pub(crate) fn read(&mut self, max_len: usize) -> Vec<u8> {
        let start = self.cursor as usize;
        let end = start.saturating_add(max_len).min(self.data.len());
        let bytes = self.data[start..end].to_vec();
        self.cursor = end as u64;
        bytes
    }

    /// Size after writing `len` bytes at the cursor
    pub(crate) fn size_after_write(&self, len: usize) -> u64 {
        self.size().max(self.cursor + len as u64)
    }

    /// Apply a write at the cursor whose allocation has already been settled
    pub(crate) fn apply_write(&mut self, bytes: &[u8], extent: Extent) {
        let start = self.cursor as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(bytes);
        self.cursor = end as u64;
        self.extent = extent;
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}
