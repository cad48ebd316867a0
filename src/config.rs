//! # Configuration Constants
//!
//! This module centralizes the engine's tunables. Constants that depend on
//! each other are co-located so a change in one is checked against the
//! others.
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> PAGE_HEADER_SIZE (6 bytes: id u32 | version u8 | type u8)
//!       │
//!       └─> PAGE_DATA_SIZE (derived: PAGE_SIZE - PAGE_HEADER_SIZE)
//!             The slot allocator manages exactly this many bytes per row
//!             page; the metadata catalog must serialize into it as well.
//!
//! DEFAULT_POOL_CAPACITY (16 frames)
//!       │
//!       └─> Clock sweep probes at most 2 * capacity frames before giving
//!           up. Capacity must be >= 2 so that appending a data page while
//!           the metadata page is pinned can always find a victim.
//!
//! MAX_NAME_LEN (64 bytes)
//!       │
//!       └─> Budget for an *encoded* table or column name, including the
//!           4-byte varchar length prefix. Raw names are therefore capped
//!           at 60 bytes.
//! ```

/// Size of a single on-disk page in bytes, the unit of file I/O.
pub const PAGE_SIZE: usize = 4096;

/// Size of the fixed page header: `page_id: u32 | version: u8 | page_type: u8`.
pub const PAGE_HEADER_SIZE: usize = 6;

/// Bytes available to the page's typed payload.
pub const PAGE_DATA_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// On-disk format version stamped into every page header.
pub const PAGE_VERSION: u8 = 1;

/// Number of frames in the buffer pool unless overridden by the builder.
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// Page id of the metadata page. Always the first page of the file.
pub const METADATA_PAGE_ID: u32 = 0;

/// Budget in bytes for an encoded table or column name, varchar header
/// included.
pub const MAX_NAME_LEN: usize = 64;

const _: () = assert!(PAGE_HEADER_SIZE < PAGE_SIZE);
const _: () = assert!(DEFAULT_POOL_CAPACITY >= 2);
