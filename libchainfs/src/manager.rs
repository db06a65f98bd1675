//! FileSystemManager: the public storage API and its concurrency gate.
//!
//! All metadata lives in memory behind one fair `RwLock`. `read_file`,
//! `list_files` and the other queries take it shared; `create_file`,
//! `write_file` and `delete_file` take it exclusive and keep it until the full
//! metadata region has been rewritten. Persisting requires a reference to the
//! write guard, so it can only run inside an operation that already holds the
//! exclusive lock and never re-acquires it.
//!
//! Mutations are staged on a copy of the tables. The guarded tables change
//! only in the synchronous step after the staged copy has been persisted, so
//! an operation that fails or is dropped mid-await leaves them untouched.

use crate::chain::{ChainLink, ChainReader, ChainWriter};
use crate::error::{FsError, Result};
use crate::layout::{Geometry, MAX_FILE_SIZE, required_blocks};
use crate::meta::{self, LinkId, MetaTables};
use crate::store::{BlockStore, FileBlockStore};
use std::path::Path;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Snapshot of one file's directory entry and chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub size: usize,
    pub links: Vec<LinkId>,
}

pub struct FileSystemManager<S: BlockStore> {
    store: S,
    geometry: Geometry,
    tables: RwLock<MetaTables>,
}

impl FileSystemManager<FileBlockStore> {
    /// Open a file-backed container, formatting it if it was just created.
    pub async fn open_file(path: impl AsRef<Path>, total_size: u64) -> Result<Self> {
        let store = FileBlockStore::open(path, total_size).await?;
        if store.created() {
            Self::format(store).await
        } else {
            Self::load(store).await
        }
    }
}

impl<S: BlockStore> FileSystemManager<S> {
    /// Initialize `store` with an empty directory and chain table.
    pub async fn format(store: S) -> Result<Self> {
        let geometry = Geometry::for_blocks(store.block_count())?;
        let tables = MetaTables::default();
        write_metadata(&store, &tables).await?;
        store.sync().await?;
        info!(
            blocks = geometry.total_blocks,
            capacity = geometry.capacity,
            "formatted container"
        );
        Ok(Self {
            store,
            geometry,
            tables: RwLock::new(tables),
        })
    }

    /// Load and verify the metadata region of an existing container.
    pub async fn load(store: S) -> Result<Self> {
        let geometry = Geometry::for_blocks(store.block_count())?;
        let buf = store.read_blocks(0, geometry.metadata_blocks).await?;
        let mut tables = meta::decode(&buf)?;
        let orphans = tables.reclaim_orphans();
        tables.check(geometry.capacity)?;
        if !orphans.is_empty() {
            warn!(?orphans, "reclaiming chain nodes owned by no file");
            write_metadata(&store, &tables).await?;
            let links: Vec<ChainLink> = orphans
                .iter()
                .filter(|&&link| (link as usize) < geometry.capacity)
                .map(|&link| ChainLink {
                    link,
                    data_block: link,
                })
                .collect();
            if let Err(err) = ChainWriter::new(geometry, &store).zero(&links).await {
                warn!(error = %err, blocks = links.len(), "failed to zero reclaimed blocks");
            }
        }
        info!(
            blocks = geometry.total_blocks,
            files = tables.dir.entries().count(),
            free = tables.chain.free_count(geometry.capacity),
            "loaded container"
        );
        Ok(Self {
            store,
            geometry,
            tables: RwLock::new(tables),
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create_file(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let slot = staged.dir.create(name)?;
        self.commit(&mut tables, staged).await?;
        debug!(name, slot, "created file");
        Ok(())
    }

    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let tables = self.tables.read().await;
        let entry = tables
            .dir
            .lookup(name)
            .and_then(|slot| tables.dir.get(slot))
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let links = tables.chain.walk(entry.first_link)?;
        let data = ChainReader::new(self.geometry, &self.store)
            .read(&links, entry.size as usize)
            .await?;
        debug!(name, size = data.len(), "read file");
        Ok(data)
    }

    /// Replace the whole content of `name` with `data`.
    ///
    /// The new chain is allocated and written before the entry is repointed,
    /// so any failure leaves the previous content in place.
    pub async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        if data.len() > MAX_FILE_SIZE {
            return Err(FsError::InvalidArgument(format!(
                "payload of {} bytes exceeds the {MAX_FILE_SIZE}-byte file size limit",
                data.len()
            )));
        }
        let mut tables = self.tables.write().await;
        let slot = tables
            .dir
            .lookup(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let old_first = tables.dir.get(slot).and_then(|e| e.first_link);
        let old_links = tables.chain.walk(old_first)?;

        let mut staged = tables.clone();
        let required = required_blocks(data.len());
        let links = staged.chain.allocate(required, self.geometry.capacity)?;
        let writer = ChainWriter::new(self.geometry, &self.store);
        if let Err(err) = writer.write(&links, data).await {
            warn!(name, error = %err, "writing new chain failed, keeping previous content");
            return Err(err.into());
        }

        staged.chain.release(&old_links);
        if let Some(entry) = staged.dir.get_mut(slot) {
            entry.size = data.len() as u16;
            entry.first_link = links.first().map(|l| l.link);
        }
        self.commit(&mut tables, staged).await?;
        self.scrub(&writer, &old_links).await;
        debug!(name, size = data.len(), blocks = required, "wrote file");
        Ok(())
    }

    pub async fn delete_file(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .dir
            .lookup(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let first = tables.dir.get(slot).and_then(|e| e.first_link);
        let old_links = tables.chain.walk(first)?;

        let mut staged = tables.clone();
        staged.chain.release(&old_links);
        staged.dir.remove(name)?;
        self.commit(&mut tables, staged).await?;
        self.scrub(&ChainWriter::new(self.geometry, &self.store), &old_links)
            .await;
        debug!(name, freed = old_links.len(), "deleted file");
        Ok(())
    }

    /// Names of all files, in directory slot order.
    pub async fn list_files(&self) -> Vec<String> {
        self.tables.read().await.dir.names()
    }

    pub async fn stat(&self, name: &str) -> Result<FileStat> {
        let tables = self.tables.read().await;
        let entry = tables
            .dir
            .lookup(name)
            .and_then(|slot| tables.dir.get(slot))
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let links = tables.chain.walk(entry.first_link)?;
        Ok(FileStat {
            name: entry.name.clone(),
            size: entry.size as usize,
            links: links.iter().map(|l| l.link).collect(),
        })
    }

    /// Chain nodes currently available to `write_file`.
    ///
    /// Bounded by [`Geometry::capacity`], which is below 64 when the container
    /// is too small to hold every data block (60 for an 8192-byte container).
    pub async fn free_blocks(&self) -> usize {
        self.tables
            .read()
            .await
            .chain
            .free_count(self.geometry.capacity)
    }

    /// Verify the in-memory tables against the directory/chain invariants.
    pub async fn check(&self) -> Result<()> {
        self.tables.read().await.check(self.geometry.capacity)
    }

    pub async fn sync(&self) -> Result<()> {
        let _tables = self.tables.read().await;
        self.store.sync().await?;
        Ok(())
    }

    /// Persist `staged` as the full metadata region, then install it as the
    /// live tables. Holding the write guard is the proof that no other
    /// operation can observe the region mid-write.
    async fn commit(
        &self,
        tables: &mut RwLockWriteGuard<'_, MetaTables>,
        staged: MetaTables,
    ) -> Result<()> {
        if let Err(err) = write_metadata(&self.store, &staged).await {
            warn!(error = %err, "persisting metadata failed, keeping previous tables");
            return Err(err);
        }
        **tables = staged;
        Ok(())
    }

    /// Zero the data blocks of a chain that the persisted metadata no longer references.
    async fn scrub(&self, writer: &ChainWriter<'_, S>, links: &[ChainLink]) {
        if let Err(err) = writer.zero(links).await {
            warn!(error = %err, blocks = links.len(), "failed to zero released blocks");
        }
    }
}

async fn write_metadata<S: BlockStore>(store: &S, tables: &MetaTables) -> Result<()> {
    store.write_blocks(0, &meta::encode(tables)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{BLOCK_SIZE, DEFAULT_CONTAINER_SIZE, MAX_BLOCKS};
    use crate::store::InMemoryBlockStore;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn fresh() -> FileSystemManager<InMemoryBlockStore> {
        FileSystemManager::format(InMemoryBlockStore::new(DEFAULT_CONTAINER_SIZE as usize))
            .await
            .unwrap()
    }

    /// Memory store whose writes can be made to fail, or data writes to hang.
    struct FlakyStore {
        inner: InMemoryBlockStore,
        fail_data: AtomicBool,
        fail_meta: AtomicBool,
        stall_data: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: InMemoryBlockStore::new(DEFAULT_CONTAINER_SIZE as usize),
                fail_data: AtomicBool::new(false),
                fail_meta: AtomicBool::new(false),
                stall_data: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl BlockStore for FlakyStore {
        fn block_count(&self) -> u32 {
            self.inner.block_count()
        }

        async fn read_blocks(&self, start: u32, count: u32) -> io::Result<Vec<u8>> {
            self.inner.read_blocks(start, count).await
        }

        async fn write_blocks(&self, start: u32, data: &[u8]) -> io::Result<()> {
            let failing = if start == 0 {
                &self.fail_meta
            } else {
                &self.fail_data
            };
            if failing.load(Ordering::SeqCst) {
                return Err(io::Error::other("injected failure"));
            }
            if start != 0 && self.stall_data.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.write_blocks(start, data).await
        }
    }

    #[tokio::test]
    async fn test_create_write_read() {
        let fs = fresh().await;
        fs.create_file("a.txt").await.unwrap();
        assert!(fs.read_file("a.txt").await.unwrap().is_empty());

        fs.write_file("a.txt", b"hello world").await.unwrap();
        assert_eq!(fs.read_file("a.txt").await.unwrap(), b"hello world");
        assert_eq!(fs.stat("a.txt").await.unwrap().links, vec![0]);
    }

    #[tokio::test]
    async fn test_metadata_region_tracks_memory() {
        let fs = fresh().await;
        fs.create_file("a").await.unwrap();
        fs.write_file("a", &[3u8; 300]).await.unwrap();

        let raw = fs.store().read_blocks(0, 4).await.unwrap();
        let on_disk = meta::decode(&raw).unwrap();
        assert_eq!(on_disk, *fs.tables.read().await);
    }

    #[tokio::test]
    async fn test_overwrite_zeroes_old_blocks() {
        let fs = fresh().await;
        fs.create_file("a").await.unwrap();
        fs.write_file("a", &[9u8; 3 * BLOCK_SIZE]).await.unwrap();
        assert_eq!(fs.stat("a").await.unwrap().links, vec![0, 1, 2]);

        fs.write_file("a", b"tiny").await.unwrap();
        assert_eq!(fs.stat("a").await.unwrap().links, vec![3]);
        let g = fs.geometry();
        let old = fs.store().read_blocks(g.data_start, 3).await.unwrap();
        assert!(old.iter().all(|&b| b == 0));
        assert_eq!(fs.free_blocks().await, MAX_BLOCKS - 1);
    }

    #[tokio::test]
    async fn test_oversized_payload_is_invalid_argument() {
        let fs = fresh().await;
        fs.create_file("big").await.unwrap();
        let err = fs
            .write_file("big", &vec![0u8; MAX_FILE_SIZE + 1])
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_failed_data_write_keeps_previous_content() {
        let store = FlakyStore::new();
        let fs = FileSystemManager::format(store).await.unwrap();
        fs.create_file("a").await.unwrap();
        fs.write_file("a", b"v1").await.unwrap();

        fs.store().fail_data.store(true, Ordering::SeqCst);
        let err = fs.write_file("a", b"v2").await.unwrap_err();
        assert!(matches!(err, FsError::Io(_)));
        fs.store().fail_data.store(false, Ordering::SeqCst);

        assert_eq!(fs.read_file("a").await.unwrap(), b"v1");
        assert_eq!(fs.free_blocks().await, MAX_BLOCKS - 1);
        fs.check().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_tables() {
        let store = FlakyStore::new();
        let fs = FileSystemManager::format(store).await.unwrap();
        fs.create_file("keep").await.unwrap();

        fs.store().fail_meta.store(true, Ordering::SeqCst);
        assert!(fs.create_file("lost").await.is_err());
        assert!(fs.delete_file("keep").await.is_err());
        fs.store().fail_meta.store(false, Ordering::SeqCst);

        assert_eq!(fs.list_files().await, vec!["keep"]);
    }

    #[tokio::test]
    async fn test_dropped_write_leaves_tables_intact() {
        let store = FlakyStore::new();
        let fs = FileSystemManager::format(store).await.unwrap();
        fs.create_file("a").await.unwrap();
        fs.write_file("a", b"v1").await.unwrap();

        fs.store().stall_data.store(true, Ordering::SeqCst);
        let stalled = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            fs.write_file("a", &[1u8; 1000]),
        )
        .await;
        assert!(stalled.is_err());
        fs.store().stall_data.store(false, Ordering::SeqCst);

        assert_eq!(fs.free_blocks().await, MAX_BLOCKS - 1);
        assert_eq!(fs.read_file("a").await.unwrap(), b"v1");
        fs.check().await.unwrap();

        // The next mutation persists the tables; the region must still load.
        fs.create_file("b").await.unwrap();
        let raw = fs.store().read_blocks(0, 4).await.unwrap();
        let on_disk = meta::decode(&raw).unwrap();
        on_disk.check(fs.geometry().capacity).unwrap();
        assert_eq!(on_disk.chain.free_count(MAX_BLOCKS), MAX_BLOCKS - 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_chain() {
        let store = FlakyStore::new();
        let fs = FileSystemManager::format(store).await.unwrap();
        fs.create_file("a").await.unwrap();
        fs.write_file("a", &[4u8; 300]).await.unwrap();

        fs.store().fail_meta.store(true, Ordering::SeqCst);
        assert!(fs.delete_file("a").await.is_err());
        fs.store().fail_meta.store(false, Ordering::SeqCst);

        assert_eq!(fs.read_file("a").await.unwrap(), vec![4u8; 300]);
        assert_eq!(fs.free_blocks().await, MAX_BLOCKS - 3);
        fs.check().await.unwrap();
    }
}
