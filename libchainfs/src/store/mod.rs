//! Block storage backends: whole-block reads and writes over one fixed-size container.
//!
//! - `memory`: a `Vec<u8>` container for tests and demos
//! - `file`: a container backed by a single pre-sized host file

mod file;
mod memory;

pub use file::FileBlockStore;
pub use memory::InMemoryBlockStore;

use crate::layout::BLOCK_SIZE;
use async_trait::async_trait;
use std::io;

/// Abstract fixed-size block container.
///
/// Block `i` lives at byte offset `i * BLOCK_SIZE`. Requests outside
/// `0..block_count()` fail with an `InvalidInput` error.
#[async_trait]
pub trait BlockStore: Send + Sync {
    fn block_count(&self) -> u32;

    async fn read_blocks(&self, start: u32, count: u32) -> io::Result<Vec<u8>>;

    /// Write `data` starting at block `start`. A short final block is
    /// zero-padded so only whole blocks reach the container.
    async fn write_blocks(&self, start: u32, data: &[u8]) -> io::Result<()>;

    async fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Byte range covered by `count` blocks from `start`, if it fits in `total` blocks.
pub(crate) fn block_range(start: u32, count: u32, total: u32) -> io::Result<(usize, usize)> {
    let end = start.checked_add(count).filter(|end| *end <= total);
    match end {
        Some(end) => Ok((start as usize * BLOCK_SIZE, end as usize * BLOCK_SIZE)),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("blocks {start}..{start}+{count} out of range for container of {total} blocks"),
        )),
    }
}

/// Copy of `data` padded with zeros up to the next block boundary.
pub(crate) fn pad_to_blocks(data: &[u8]) -> Vec<u8> {
    let mut buf = data.to_vec();
    let padded = data.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    buf.resize(padded, 0);
    buf
}
