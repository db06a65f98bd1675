//! Library crate for ChainFS: a single-container block storage engine.
//!
//! The container is split into fixed 128-byte blocks. The leading blocks hold
//! a fixed directory table (16 entries) and a FAT-style chain table (64 nodes);
//! the rest hold file data. [`FileSystemManager`] is the entry point and
//! serializes all access through one reader/writer gate.

pub mod chain;
pub mod dir;
pub mod error;
pub mod layout;
pub mod manager;
pub mod meta;
pub mod store;

pub use error::{FsError, Result};
pub use layout::{BLOCK_SIZE, Geometry, MAX_BLOCKS, MAX_FILE_ENTRIES, MAX_FILE_SIZE, NAME_LEN};
pub use manager::{FileStat, FileSystemManager};
pub use store::{BlockStore, FileBlockStore, InMemoryBlockStore};
