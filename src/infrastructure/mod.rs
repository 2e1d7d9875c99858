//! Adapters for the domain ports.

pub mod in_memory;
pub mod retrying_directory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
