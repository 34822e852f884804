//! Storage core: allocation, partition I/O, namespace and the file store

pub mod allocator;
pub mod config;
pub mod error;
pub mod io;
pub mod namespace;
pub mod record;
pub mod store;

pub use store::{FileStore, MoveStrategy, OnMissing, StoreStats};
