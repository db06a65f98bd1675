//! On-container geometry: block size, table capacities and record widths.
//!
//! Container layout:
//!
//! ```text
//! block 0 .. METADATA_BLOCKS      directory table, chain table, zero padding
//! block METADATA_BLOCKS ..        data blocks, addressed relative to data_start
//! ```

use crate::error::{FsError, Result};

pub const BLOCK_SIZE: usize = 128;
pub const MAX_FILE_ENTRIES: usize = 16;
pub const MAX_BLOCKS: usize = 64;
/// Longest file name in bytes.
pub const NAME_LEN: usize = 11;
/// Largest payload the signed 16-bit size field can describe.
pub const MAX_FILE_SIZE: usize = i16::MAX as usize;

/// name + size (i16) + first link (i16)
pub const ENTRY_RECORD_LEN: usize = NAME_LEN + 2 + 2;
/// data block (i16) + next link (i16)
pub const NODE_RECORD_LEN: usize = 2 + 2;
pub const METADATA_LEN: usize = MAX_FILE_ENTRIES * ENTRY_RECORD_LEN + MAX_BLOCKS * NODE_RECORD_LEN;
pub const METADATA_BLOCKS: usize = METADATA_LEN.div_ceil(BLOCK_SIZE);
pub const METADATA_REGION_LEN: usize = METADATA_BLOCKS * BLOCK_SIZE;

/// Container size that makes every chain node addressable.
pub const DEFAULT_CONTAINER_SIZE: u64 = ((METADATA_BLOCKS + MAX_BLOCKS) * BLOCK_SIZE) as u64;

/// Blocks needed to hold `len` bytes. An empty payload still takes one block.
pub fn required_blocks(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE).max(1)
}

/// Derived placement of the metadata and data regions in one container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub total_blocks: u32,
    pub metadata_blocks: u32,
    pub data_start: u32,
    /// Number of chain nodes whose data block fits in the container.
    pub capacity: usize,
}

impl Geometry {
    pub fn for_blocks(total_blocks: u32) -> Result<Self> {
        let metadata_blocks = METADATA_BLOCKS as u32;
        if total_blocks <= metadata_blocks {
            return Err(FsError::InvalidArgument(format!(
                "container of {total_blocks} blocks cannot hold {metadata_blocks} metadata blocks and any data"
            )));
        }
        let capacity = ((total_blocks - metadata_blocks) as usize).min(MAX_BLOCKS);
        Ok(Self {
            total_blocks,
            metadata_blocks,
            data_start: metadata_blocks,
            capacity,
        })
    }

    pub fn for_len(container_len: u64) -> Result<Self> {
        let blocks = u32::try_from(container_len / BLOCK_SIZE as u64).map_err(|_| {
            FsError::InvalidArgument(format!("container of {container_len} bytes is too large"))
        })?;
        Self::for_blocks(blocks)
    }

    /// Physical block backing the given data-region index.
    pub fn physical_block(&self, data_block: u16) -> u32 {
        self.data_start + u32::from(data_block)
    }
}

/// One block-sized piece of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub offset: usize,
    pub len: usize,
}

/// Split a payload of `len` bytes into consecutive block spans.
///
/// Always yields `required_blocks(len)` spans; only the last may be short,
/// and for an empty payload it is empty.
pub fn split_into_blocks(len: usize) -> Vec<BlockSpan> {
    (0..required_blocks(len))
        .map(|i| {
            let offset = i * BLOCK_SIZE;
            BlockSpan {
                offset,
                len: BLOCK_SIZE.min(len.saturating_sub(offset)),
            }
        })
        .collect()
}
