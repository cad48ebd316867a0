//! # Pager
//!
//! Backs the clock pool with a single file of page-aligned blocks. Page id
//! `n` lives at byte offset `n * 4096`; ids are assigned densely from 0 and
//! the file only ever grows. Page 0 is always the metadata page.
//!
//! ## Fetch Path
//!
//! ```text
//! fetch(id) ── pool hit ──> pin, return guard
//!          └── pool miss ─> allocate frame (may evict + flush another
//!                           page), read block from disk, validate the
//!                           format version, return guard
//! ```
//!
//! ## Pin Guards
//!
//! Every fetched or appended page is returned as a [`PageGuard`], which
//! pins the underlying frame for its lifetime and unpins on drop. A caller
//! holding a guard can therefore never observe the frame being rebound
//! under it. `read()`/`write()` expose the page's data area under the
//! frame's block lock; `write()` marks the frame dirty.
//!
//! ## Durability
//!
//! Eviction write-back keeps the file consistent with the pool, but blocks
//! only hit stable storage on `sync` (flush every dirty resident page, then
//! `File::sync_all`). `close` is `sync` plus dropping the descriptor.

use std::fs::{create_dir_all, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use eyre::{ensure, Result, WrapErr};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::frame::{BufferFrame, PageBlock, PageType};
use super::metadata::MetadataPage;
use super::pool::ClockPool;
use crate::config::{METADATA_PAGE_ID, PAGE_HEADER_SIZE, PAGE_SIZE};

/// RAII pin on a resident page.
#[derive(Debug)]
pub struct PageGuard {
    frame: Arc<BufferFrame>,
}

impl PageGuard {
    /// Wraps a frame that the pool already pinned on our behalf.
    fn adopt(frame: Arc<BufferFrame>) -> Self {
        Self { frame }
    }

    pub fn id(&self) -> u32 {
        self.frame.id()
    }

    pub fn page_type(&self) -> PageType {
        self.frame.page_type()
    }

    pub fn set_page_type(&self, page_type: PageType) {
        self.frame.set_page_type(page_type);
    }

    /// Shared access to the page's data area.
    pub fn read(&self) -> PageData<'_> {
        PageData {
            block: self.frame.block_read(),
        }
    }

    /// Exclusive access to the page's data area; marks the frame dirty.
    pub fn write(&self) -> PageDataMut<'_> {
        self.frame.mark_dirty();
        PageDataMut {
            block: self.frame.block_write(),
        }
    }

    fn frame(&self) -> &BufferFrame {
        &self.frame
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

pub struct PageData<'a> {
    block: RwLockReadGuard<'a, PageBlock>,
}

impl PageData<'_> {
    pub fn data(&self) -> &[u8] {
        &self.block[PAGE_HEADER_SIZE..]
    }
}

pub struct PageDataMut<'a> {
    block: RwLockWriteGuard<'a, PageBlock>,
}

impl PageDataMut<'_> {
    pub fn data(&self) -> &[u8] {
        &self.block[PAGE_HEADER_SIZE..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.block[PAGE_HEADER_SIZE..]
    }
}

#[derive(Debug)]
pub struct Pager {
    file: File,
    pool: ClockPool,
}

impl Pager {
    /// Opens or creates the database file. A fresh file gets its metadata
    /// page (page 0) before this returns.
    pub fn open<P: AsRef<Path>>(path: P, pool_capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)
                    .wrap_err_with(|| format!("failed to create directory {}", parent.display()))?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file {}", path.display()))?;

        let len = file.metadata()?.len();
        ensure!(
            len % PAGE_SIZE as u64 == 0,
            "database file length {} is not a multiple of the page size",
            len
        );

        let pager = Self {
            file,
            pool: ClockPool::new(pool_capacity),
        };

        if len == 0 {
            log::debug!("creating fresh database file at {}", path.display());
            pager.create_metadata_page()?;
        }

        Ok(pager)
    }

    fn page_offset(id: u32) -> u64 {
        id as u64 * PAGE_SIZE as u64
    }

    fn write_block_at(&self, id: u32, block: &[u8]) -> Result<()> {
        log::trace!("writing page {id} at offset {}", Self::page_offset(id));
        self.file
            .write_all_at(block, Self::page_offset(id))
            .wrap_err_with(|| format!("failed to write page {id}"))
    }

    /// Returns a pinned guard for page `id`, reading it from disk on a pool
    /// miss. A miss may evict (and flush) an unrelated page.
    pub fn fetch(&self, id: u32) -> Result<PageGuard> {
        if let Some(frame) = self.pool.get(id) {
            return Ok(PageGuard::adopt(frame));
        }

        let frame = self
            .pool
            .allocate(id, |victim, block| self.write_block_at(victim, block))
            .wrap_err_with(|| format!("failed to allocate a frame for page {id}"))?;
        let guard = PageGuard::adopt(frame);

        {
            let mut block = guard.frame().block_write();
            self.file
                .read_exact_at(&mut block[..], Self::page_offset(id))
                .wrap_err_with(|| format!("failed to read page {id}"))?;
            guard.frame().reload_header(&block[..])?;
        }

        Ok(guard)
    }

    /// Appends a zeroed page of the given type at the end of the file and
    /// bumps the metadata page's total page count.
    pub fn append(&self, page_type: PageType) -> Result<PageGuard> {
        let id = self.pages_count()?;
        let guard = self.append_unregistered(id)?;

        {
            let mut metadata = self.metadata()?;
            metadata.set_pages_count(id + 1)?;
        }

        guard.set_page_type(page_type);
        log::debug!("appended page {id} of type {page_type:?}");
        Ok(guard)
    }

    /// Appends a page without touching the metadata page. Needed when the
    /// metadata page itself is being created.
    fn append_unregistered(&self, id: u32) -> Result<PageGuard> {
        let frame = self
            .pool
            .allocate(id, |victim, block| self.write_block_at(victim, block))?;
        let guard = PageGuard::adopt(frame);

        {
            let block = guard.frame().block_read();
            self.write_block_at(id, &block[..])?;
        }

        Ok(guard)
    }

    fn create_metadata_page(&self) -> Result<()> {
        let guard = self.append_unregistered(METADATA_PAGE_ID)?;
        guard.set_page_type(PageType::Metadata);

        let mut metadata = MetadataPage::new(guard)
            .wrap_err("failed to initialize the fresh metadata page")?;
        metadata.set_pages_count(1)?;
        Ok(())
    }

    /// Typed view over page 0, re-parsed on every call.
    pub fn metadata(&self) -> Result<MetadataPage> {
        let guard = self
            .fetch(METADATA_PAGE_ID)
            .wrap_err("unable to fetch the metadata page")?;
        MetadataPage::new(guard)
    }

    pub fn pages_count(&self) -> Result<u32> {
        Ok(self.metadata()?.pages_count())
    }

    /// Writes every dirty resident page at its offset and syncs the file.
    pub fn sync(&self) -> Result<()> {
        self.pool.visit(|frame| {
            if !frame.is_dirty() {
                return Ok(());
            }
            let block = frame.block_read();
            self.write_block_at(frame.id(), &block[..])?;
            frame.clear_dirty();
            Ok(())
        })?;

        self.file
            .sync_all()
            .wrap_err("failed to sync the database file")
    }

    /// Flushes everything and closes the file descriptor.
    pub fn close(self) -> Result<()> {
        self.sync().wrap_err("failed to sync before close")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_POOL_CAPACITY;
    use tempfile::tempdir;

    #[test]
    fn open_creates_the_metadata_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let pager = Pager::open(&path, DEFAULT_POOL_CAPACITY).unwrap();
        assert_eq!(pager.pages_count().unwrap(), 1);

        let page = pager.fetch(METADATA_PAGE_ID).unwrap();
        assert_eq!(page.page_type(), PageType::Metadata);
        drop(page);
        pager.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), PAGE_SIZE as u64);
    }

    #[test]
    fn pages_survive_close_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let pager = Pager::open(&path, DEFAULT_POOL_CAPACITY).unwrap();
            let page = pager.append(PageType::Row).unwrap();
            assert_eq!(page.id(), 1);
            page.write().data_mut()[0] = 0xCD;
            drop(page);
            pager.close().unwrap();
        }

        let pager = Pager::open(&path, DEFAULT_POOL_CAPACITY).unwrap();
        assert_eq!(pager.pages_count().unwrap(), 2);

        let page = pager.fetch(1).unwrap();
        assert_eq!(page.page_type(), PageType::Row);
        assert_eq!(page.read().data()[0], 0xCD);
    }

    #[test]
    fn append_assigns_dense_page_ids() {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("test.db"), DEFAULT_POOL_CAPACITY).unwrap();

        for expected in 1..5 {
            let page = pager.append(PageType::Row).unwrap();
            assert_eq!(page.id(), expected);
        }
        assert_eq!(pager.pages_count().unwrap(), 5);
    }

    #[test]
    fn eviction_flushes_dirty_pages_before_rebinding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let pager = Pager::open(&path, 2).unwrap();

        // Dirty page 1, then force it out of the two-frame pool.
        {
            let page = pager.append(PageType::Row).unwrap();
            page.write().data_mut()[..4].copy_from_slice(b"mark");
        }
        {
            let _spill = pager.append(PageType::Row).unwrap();
        }

        // Page 1 must have been written back; fetching it again reads the
        // mutated block from disk.
        let page = pager.fetch(1).unwrap();
        assert_eq!(&page.read().data()[..4], b"mark");
    }

    #[test]
    fn fetch_rejects_an_unknown_format_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let pager = Pager::open(&path, DEFAULT_POOL_CAPACITY).unwrap();
            pager.close().unwrap();
        }

        // Corrupt the version byte of page 0.
        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.write_all_at(&[0xFF], 4).unwrap();
        }

        let pager = Pager::open(&path, DEFAULT_POOL_CAPACITY).unwrap();
        let err = pager.fetch(0).unwrap_err();
        assert!(format!("{err:?}").contains("invalid page version"));
    }

    #[test]
    fn torn_files_are_rejected_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 17]).unwrap();

        let err = Pager::open(&path, DEFAULT_POOL_CAPACITY).unwrap_err();
        assert!(err.to_string().contains("not a multiple"));
    }

    #[test]
    fn fetch_past_the_end_of_file_fails() {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("test.db"), DEFAULT_POOL_CAPACITY).unwrap();

        assert!(pager.fetch(40).is_err());
    }
}
