use super::{BlockStore, block_range, pad_to_blocks};
use crate::layout::BLOCK_SIZE;
use async_trait::async_trait;
use std::io;
use std::sync::Mutex;

/// Simple in-memory container, zero-filled at creation.
pub struct InMemoryBlockStore {
    blocks: u32,
    data: Mutex<Vec<u8>>,
}

impl InMemoryBlockStore {
    /// Container of `total_size` bytes, rounded down to whole blocks.
    pub fn new(total_size: usize) -> Self {
        let blocks = (total_size / BLOCK_SIZE) as u32;
        Self {
            blocks,
            data: Mutex::new(vec![0u8; blocks as usize * BLOCK_SIZE]),
        }
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.data
            .lock()
            .map_err(|_| io::Error::other("in-memory container lock poisoned"))
    }
}

#[async_trait]
impl BlockStore for InMemoryBlockStore {
    fn block_count(&self) -> u32 {
        self.blocks
    }

    async fn read_blocks(&self, start: u32, count: u32) -> io::Result<Vec<u8>> {
        let (from, to) = block_range(start, count, self.blocks)?;
        Ok(self.lock()?[from..to].to_vec())
    }

    async fn write_blocks(&self, start: u32, data: &[u8]) -> io::Result<()> {
        let buf = pad_to_blocks(data);
        let count = (buf.len() / BLOCK_SIZE) as u32;
        let (from, to) = block_range(start, count, self.blocks)?;
        self.lock()?[from..to].copy_from_slice(&buf);
        Ok(())
    }
}
