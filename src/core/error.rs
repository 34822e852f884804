use thiserror::Error;

/// Caller-facing classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Open declined or target missing
    NotFound,
    /// No contiguous free run large enough
    InsufficientSpace,
    /// Bad length, missing handle, bad seek base, empty name
    InvalidArgument,
    /// Storage medium failure
    Io,
    /// Internal allocator invariant violated
    AllocationInconsistency,
    /// Invalid store configuration
    Config,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient space: no run of {needed} contiguous free blocks ({free} blocks free)")]
    InsufficientSpace { needed: usize, free: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Partition access out of bounds: offset {offset} + {len} bytes exceeds capacity {capacity}")]
    OutOfBounds { offset: u64, len: u64, capacity: u64 },

    #[error("Allocation inconsistency at blocks [{start}, {start}+{length}): {reason}")]
    AllocationInconsistency {
        start: usize,
        length: usize,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl StoreError {
    /// Map this error onto the kind a caller reports to the user
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::Io(_) | StoreError::OutOfBounds { .. } => ErrorKind::Io,
            StoreError::AllocationInconsistency { .. } => ErrorKind::AllocationInconsistency,
            StoreError::Config(_) | StoreError::ConfigParse(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn no_open_file() -> Self {
        StoreError::InvalidArgument("no file is open".to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
