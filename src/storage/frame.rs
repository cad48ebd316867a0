//! # Buffer Frames
//!
//! A frame owns one 4096-byte page block plus the transient flags the
//! replacement policy needs. Frames live for the lifetime of the pool and
//! are *rebound* to different page ids as eviction recycles them.
//!
//! ## Page Header Layout (6 bytes)
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  ---------  --------------------------
//! 0       4     page_id    u32 BE
//! 4       1     version    Format version, always 1
//! 5       1     page_type  1 = Row, 2 = Metadata
//! ```
//!
//! ## Flags
//!
//! - `pins`: reference count; a pinned frame is never chosen as an eviction
//!   victim.
//! - `referenced`: clock second-chance bit, set on every access.
//! - `dirty`: set by any mutation, cleared only by a successful flush.
//! - `initialized`: set once the frame has been bound to a real page id;
//!   fresh frames are not tracked in the pool's address map.
//!
//! The id and type bytes are authoritative on disk but cached in atomics
//! after `bind`/`reload_header`, so getters never re-parse the block.
//!
//! ## Thread Safety
//!
//! Flags are atomics; the block itself sits behind a `parking_lot::RwLock`.
//! Row-page writers take the write half, readers the read half.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use eyre::{ensure, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use zerocopy::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{PAGE_HEADER_SIZE, PAGE_SIZE, PAGE_VERSION};

/// One full page including its header.
pub type PageBlock = Box<[u8; PAGE_SIZE]>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Unknown = 0,
    Row = 1,
    Metadata = 2,
}

impl PageType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => PageType::Row,
            2 => PageType::Metadata,
            _ => PageType::Unknown,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct PageHeader {
    page_id: U32,
    version: u8,
    page_type: u8,
}

const _: () = assert!(size_of::<PageHeader>() == PAGE_HEADER_SIZE);

const PAGE_TYPE_OFFSET: usize = 5;

#[derive(Debug)]
pub struct BufferFrame {
    block: RwLock<PageBlock>,
    page_id: AtomicU32,
    page_type: AtomicU8,
    pins: AtomicU32,
    referenced: AtomicBool,
    dirty: AtomicBool,
    initialized: AtomicBool,
}

impl BufferFrame {
    pub(crate) fn new() -> Self {
        Self {
            block: RwLock::new(Box::new([0u8; PAGE_SIZE])),
            page_id: AtomicU32::new(0),
            page_type: AtomicU8::new(PageType::Unknown as u8),
            pins: AtomicU32::new(0),
            referenced: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u32 {
        self.page_id.load(Ordering::Acquire)
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_byte(self.page_type.load(Ordering::Acquire))
    }

    /// Writes the type byte through to the block and caches it.
    pub fn set_page_type(&self, page_type: PageType) {
        let mut block = self.block.write();
        block[PAGE_TYPE_OFFSET] = page_type as u8;
        self.page_type.store(page_type as u8, Ordering::Release);
        self.mark_dirty();
    }

    pub fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) > 0
    }

    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }

    pub fn pin(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
        self.mark_referenced();
    }

    pub fn unpin(&self) {
        let decremented = self
            .pins
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| p.checked_sub(1));
        if decremented.is_err() {
            log::warn!("unpin of unpinned page {}", self.id());
            debug_assert!(false, "unpin of unpinned page");
        }
        self.mark_referenced();
    }

    pub fn is_referenced(&self) -> bool {
        self.referenced.load(Ordering::Acquire)
    }

    pub fn mark_referenced(&self) {
        self.referenced.store(true, Ordering::Release);
    }

    pub fn clear_referenced(&self) {
        self.referenced.store(false, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn block_read(&self) -> RwLockReadGuard<'_, PageBlock> {
        self.mark_referenced();
        self.block.read()
    }

    pub(crate) fn block_write(&self) -> RwLockWriteGuard<'_, PageBlock> {
        self.mark_referenced();
        self.block.write()
    }

    /// Rebinds the frame to a new page id: flushes dirty content through
    /// `flush`, zeroes the block, stamps a fresh header and resets flags.
    /// The dirty flag is cleared last, after all mutations.
    pub(crate) fn bind<F>(&self, id: u32, flush: F) -> Result<()>
    where
        F: FnOnce(u32, &[u8]) -> Result<()>,
    {
        let mut block = self.block.write();

        if self.is_dirty() {
            flush(self.id(), &block[..])?;
            self.clear_dirty();
        }

        if self.is_pinned() {
            log::warn!("binding pinned page {}", self.id());
            debug_assert!(false, "binding a pinned frame");
        }

        block.fill(0);
        let header = PageHeader {
            page_id: U32::new(id),
            version: PAGE_VERSION,
            page_type: PageType::Unknown as u8,
        };
        block[..PAGE_HEADER_SIZE].copy_from_slice(header.as_bytes());

        self.page_id.store(id, Ordering::Release);
        self.page_type
            .store(PageType::Unknown as u8, Ordering::Release);
        self.pins.store(0, Ordering::Release);
        self.initialized.store(true, Ordering::Release);
        self.mark_referenced();
        self.clear_dirty();
        Ok(())
    }

    /// Re-caches the header after the block was filled from disk, rejecting
    /// unknown format versions.
    pub(crate) fn reload_header(&self, block: &[u8]) -> Result<()> {
        let header = PageHeader::ref_from_bytes(&block[..PAGE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse page header: {:?}", e))?;
        ensure!(
            header.version == PAGE_VERSION,
            "invalid page version, got {}, want {}",
            header.version,
            PAGE_VERSION
        );
        self.page_id.store(header.page_id.get(), Ordering::Release);
        self.page_type.store(header.page_type, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_flush(_: u32, _: &[u8]) -> Result<()> {
        panic!("flush must not be called for a clean frame");
    }

    #[test]
    fn bind_stamps_header_and_resets_flags() {
        let frame = BufferFrame::new();
        assert!(!frame.is_initialized());

        frame.bind(7, no_flush).unwrap();

        assert_eq!(frame.id(), 7);
        assert_eq!(frame.page_type(), PageType::Unknown);
        assert!(frame.is_initialized());
        assert!(frame.is_referenced());
        assert!(!frame.is_dirty());
        assert!(!frame.is_pinned());

        let block = frame.block_read();
        assert_eq!(block[..6], [0, 0, 0, 7, PAGE_VERSION, 0]);
    }

    #[test]
    fn bind_flushes_dirty_content_first() {
        let frame = BufferFrame::new();
        frame.bind(1, no_flush).unwrap();
        frame.set_page_type(PageType::Row);
        assert!(frame.is_dirty());

        let mut flushed: Option<(u32, u8)> = None;
        frame
            .bind(2, |id, block| {
                flushed = Some((id, block[PAGE_TYPE_OFFSET]));
                Ok(())
            })
            .unwrap();

        assert_eq!(flushed, Some((1, PageType::Row as u8)));
        assert_eq!(frame.id(), 2);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn set_page_type_writes_through_and_dirties() {
        let frame = BufferFrame::new();
        frame.bind(3, no_flush).unwrap();

        frame.set_page_type(PageType::Metadata);

        assert_eq!(frame.page_type(), PageType::Metadata);
        assert!(frame.is_dirty());
        assert_eq!(frame.block_read()[PAGE_TYPE_OFFSET], 2);
    }

    #[test]
    fn pins_nest_and_set_the_reference_bit() {
        let frame = BufferFrame::new();
        frame.bind(4, no_flush).unwrap();
        frame.clear_referenced();

        frame.pin();
        frame.pin();
        assert_eq!(frame.pin_count(), 2);
        assert!(frame.is_pinned());
        assert!(frame.is_referenced());

        frame.unpin();
        frame.unpin();
        assert!(!frame.is_pinned());
    }

    #[test]
    fn reload_header_rejects_wrong_version() {
        let frame = BufferFrame::new();
        frame.bind(5, no_flush).unwrap();

        let mut block = [0u8; PAGE_SIZE];
        block[4] = PAGE_VERSION + 1;
        assert!(frame.reload_header(&block).is_err());

        block[4] = PAGE_VERSION;
        block[3] = 9;
        block[5] = PageType::Row as u8;
        frame.reload_header(&block).unwrap();
        assert_eq!(frame.id(), 9);
        assert_eq!(frame.page_type(), PageType::Row);
    }
}
