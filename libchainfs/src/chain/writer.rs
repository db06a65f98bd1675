//! ChainWriter: spread a payload over the data blocks of a chain.

use super::ChainLink;
use crate::layout::{BLOCK_SIZE, Geometry, split_into_blocks};
use crate::store::BlockStore;
use std::io;

pub struct ChainWriter<'a, S: BlockStore> {
    geometry: Geometry,
    store: &'a S,
}

impl<'a, S: BlockStore> ChainWriter<'a, S> {
    pub fn new(geometry: Geometry, store: &'a S) -> Self {
        Self { geometry, store }
    }

    /// Write `payload` across `links` in chain order, one block per link.
    ///
    /// The final partial block is zero-padded. Links that sit on consecutive
    /// physical blocks are written with a single store call.
    pub async fn write(&self, links: &[ChainLink], payload: &[u8]) -> io::Result<()> {
        let spans = split_into_blocks(payload.len());
        debug_assert_eq!(spans.len(), links.len(), "chain length must match payload");

        let mut run_start: Option<u32> = None;
        let mut run = Vec::new();
        for (link, span) in links.iter().zip(spans) {
            let block = self.geometry.physical_block(link.data_block);
            if let Some(start) = run_start {
                if start + (run.len() / BLOCK_SIZE) as u32 != block {
                    self.store.write_blocks(start, &run).await?;
                    run.clear();
                    run_start = Some(block);
                }
            } else {
                run_start = Some(block);
            }
            let mut buf = [0u8; BLOCK_SIZE];
            buf[..span.len].copy_from_slice(&payload[span.offset..span.offset + span.len]);
            run.extend_from_slice(&buf);
        }
        if let Some(start) = run_start {
            self.store.write_blocks(start, &run).await?;
        }
        Ok(())
    }

    /// Zero-fill the data block of every link.
    pub async fn zero(&self, links: &[ChainLink]) -> io::Result<()> {
        let zeros = [0u8; BLOCK_SIZE];
        for link in links {
            self.store
                .write_blocks(self.geometry.physical_block(link.data_block), &zeros)
                .await?;
        }
        Ok(())
    }
}
