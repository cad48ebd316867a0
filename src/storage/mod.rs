//! # Storage Module
//!
//! The on-disk and in-memory core of the engine: a single file of 4096-byte
//! pages, a fixed-capacity buffer pool with clock replacement, and the
//! typed page views layered on top.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  metadata (catalog)   │   row (typed rows)   │
//! ├──────────────────────────────────────────────┤
//! │  allocator + freelist (slotted data areas)   │
//! ├──────────────────────────────────────────────┤
//! │  pager (file I/O, pin guards)                │
//! ├──────────────────────────────────────────────┤
//! │  pool (clock replacement) │ frame (blocks)   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every page starts with a 6-byte header (`id: u32 | version: u8 |
//! type: u8`, big-endian); the remaining 4090 bytes are the data area,
//! interpreted according to the page type. Page 0 is always the metadata
//! page; row pages hold slotted, schema-less row payloads.
//!
//! ## Module Organization
//!
//! - `frame`: buffer frames, one page block plus pin/reference/dirty flags
//! - `pool`: clock (second chance) replacement over a fixed frame array
//! - `pager`: file-backed fetch/append/sync and the RAII pin guard
//! - `allocator`: two-ended slot allocator inside a page's data area
//! - `freelist`: capacity-sorted free-slot list backing the allocator
//! - `metadata`: page-0 catalog of table descriptors
//! - `row`: typed row storage over the allocator
//!
//! ## Thread Safety
//!
//! The pool serializes frame allocation under its write lock; frame flags
//! are atomics and each frame's block sits behind its own `RwLock`. The
//! catalog and row wrappers inherit whichever side of the block lock the
//! caller holds.

pub mod allocator;
pub mod frame;
mod freelist;
pub mod metadata;
pub mod pager;
pub mod pool;
pub mod row;

pub use allocator::{SlotAllocator, SlotDirectory, ALLOCATOR_HEADER_SIZE, SLOT_HEADER_SIZE};
pub use frame::{BufferFrame, PageType};
pub use metadata::{ColumnDescriptor, MetadataPage, TableDescriptor};
pub use pager::{PageGuard, Pager};
pub use pool::ClockPool;
pub use row::{RowPage, RowPageMut, RowSchema, RowViews};

/// Identifies a page in the database file; page `n` lives at byte offset
/// `n * 4096`.
pub type PageId = u32;

/// Identifies a slot within a row page.
pub type SlotId = u16;
