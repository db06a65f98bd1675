//! ChainReader: gather a file's bytes from its chain.

use super::ChainLink;
use crate::error::{FsError, Result};
use crate::layout::{BLOCK_SIZE, Geometry};
use crate::store::BlockStore;

pub struct ChainReader<'a, S: BlockStore> {
    geometry: Geometry,
    store: &'a S,
}

impl<'a, S: BlockStore> ChainReader<'a, S> {
    pub fn new(geometry: Geometry, store: &'a S) -> Self {
        Self { geometry, store }
    }

    /// Read `size` bytes from `links` in chain order.
    ///
    /// Each block is read whole; only the bytes up to `size` are kept.
    pub async fn read(&self, links: &[ChainLink], size: usize) -> Result<Vec<u8>> {
        if links.len() * BLOCK_SIZE < size {
            return Err(FsError::CorruptMetadata(format!(
                "{} blocks cannot hold {size} bytes",
                links.len()
            )));
        }
        let mut out = Vec::with_capacity(size);
        for link in links {
            let remaining = size - out.len();
            if remaining == 0 {
                break;
            }
            let block = self
                .store
                .read_blocks(self.geometry.physical_block(link.data_block), 1)
                .await?;
            out.extend_from_slice(&block[..remaining.min(BLOCK_SIZE)]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainWriter;
    use crate::meta::ChainTable;
    use crate::store::InMemoryBlockStore;

    #[tokio::test]
    async fn test_reader_truncates_to_size() {
        let geometry = Geometry::for_len(8192).unwrap();
        let store = InMemoryBlockStore::new(8192);
        let mut table = ChainTable::default();
        let links = table.allocate(3, geometry.capacity).unwrap();
        let data: Vec<u8> = (0..300u32).map(|i| (i * 7 % 256) as u8).collect();
        ChainWriter::new(geometry, &store)
            .write(&links, &data)
            .await
            .unwrap();

        let reader = ChainReader::new(geometry, &store);
        assert_eq!(reader.read(&links, 300).await.unwrap(), data);
        assert_eq!(reader.read(&links, 10).await.unwrap(), &data[..10]);
        assert!(reader.read(&links, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reader_rejects_short_chain() {
        let geometry = Geometry::for_len(8192).unwrap();
        let store = InMemoryBlockStore::new(8192);
        let links = [ChainLink {
            link: 0,
            data_block: 0,
        }];
        let err = ChainReader::new(geometry, &store)
            .read(&links, 129)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::CorruptMetadata(_)));
    }
}
