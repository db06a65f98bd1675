use super::{BlockStore, block_range, pad_to_blocks};
use crate::layout::BLOCK_SIZE;
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Container backed by one pre-sized host file.
pub struct FileBlockStore {
    blocks: u32,
    created: bool,
    file: Mutex<File>,
}

impl FileBlockStore {
    /// Open the container at `path`, creating it if needed.
    ///
    /// An empty file is sized to `total_size` and reported by [`Self::created`].
    /// A non-empty file keeps its length; `total_size` is ignored for it.
    pub async fn open(path: impl AsRef<Path>, total_size: u64) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        let current = file.metadata().await?.len();
        let (len, created) = if current == 0 {
            file.set_len(total_size).await?;
            info!(path = %path.display(), size = total_size, "created container");
            (total_size, true)
        } else {
            if current != total_size {
                warn!(
                    path = %path.display(),
                    existing = current,
                    requested = total_size,
                    "container already exists with a different size, keeping existing size"
                );
            }
            (current, false)
        };
        let blocks = u32::try_from(len / BLOCK_SIZE as u64).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "container has too many blocks")
        })?;
        Ok(Self {
            blocks,
            created,
            file: Mutex::new(file),
        })
    }

    /// Whether [`Self::open`] found no prior content.
    pub fn created(&self) -> bool {
        self.created
    }
}

#[async_trait]
impl BlockStore for FileBlockStore {
    fn block_count(&self) -> u32 {
        self.blocks
    }

    async fn read_blocks(&self, start: u32, count: u32) -> io::Result<Vec<u8>> {
        let (from, to) = block_range(start, count, self.blocks)?;
        let mut buf = vec![0u8; to - from];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(from as u64)).await?;
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn write_blocks(&self, start: u32, data: &[u8]) -> io::Result<()> {
        let buf = pad_to_blocks(data);
        let count = (buf.len() / BLOCK_SIZE) as u32;
        let (from, _) = block_range(start, count, self.blocks)?;
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(from as u64)).await?;
        file.write_all(&buf).await?;
        file.flush().await
    }

    async fn sync(&self) -> io::Result<()> {
        self.file.lock().await.sync_data().await
    }
}
