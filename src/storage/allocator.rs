//! # Slotted-Page "Sandwich" Allocator
//!
//! Carves variable-sized payload slots out of a page's data area. The
//! allocator grows from both ends of the buffer towards the middle: a
//! fixed-size slot-header array from the low end, payloads from the high
//! end.
//!
//! ## Data Area Layout
//!
//! ```text
//! +------------------+ Offset 0
//! | slots_allocated  |  u16 BE
//! +------------------+ Offset 2
//! | slot header 0    |  9 bytes each, grows upward
//! | slot header 1    |
//! | ...              |
//! +------------------+
//! | free tail region |
//! +------------------+
//! | payload N-1      |  grows downward; payload k sits
//! | ...              |  immediately below payload k-1
//! | payload 0        |
//! +------------------+ Offset L
//! ```
//!
//! ## Slot Header Layout (9 bytes)
//!
//! ```text
//! Offset  Size  Field        Description
//! ------  ----  -----------  --------------------------------
//! 0       4     data_offset  Payload start, u32 BE
//! 4       4     size         Payload capacity in bytes, u32 BE
//! 8       1     status       0 = free, 1 = allocated
//! ```
//!
//! The header is deliberately unaligned (9 bytes, no padding); all access
//! goes through `zerocopy::Unaligned` references so the packing is safe.
//!
//! ## Allocation Strategy
//!
//! 1. Reuse the smallest free slot whose capacity fits (the free list is
//!    sorted by capacity, so the first hit is the tightest fit). Reuse does
//!    not create a new header.
//! 2. Otherwise carve a new slot below the current lowest payload. A tail
//!    allocation must leave room for the header of the *following*
//!    allocation, so the usable tail is smaller than the raw gap by one
//!    header.
//!
//! Deallocation marks the slot free, zeroes its payload and returns it to
//! the free list; slot headers are never removed, so slot indices stay
//! stable for the lifetime of the page.
//!
//! ## Known Limitation
//!
//! The tail region is measured from the *last* slot header's `data_offset`
//! even when that trailing slot has been freed, so tail space can appear
//! smaller than it physically is until the slot is reused. Tracking a
//! separate low-water mark would reclaim it.
//!
//! ## Thread Safety
//!
//! None. Callers (row page, metadata page) serialize access through the
//! owning frame's lock.

use eyre::{ensure, Result};
use zerocopy::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::freelist::FreeList;
use crate::encoding;

/// Bytes reserved at the start of the buffer for `slots_allocated`.
pub const ALLOCATOR_HEADER_SIZE: usize = 2;

/// Encoded size of one slot header.
pub const SLOT_HEADER_SIZE: usize = 9;

const SLOT_FREE: u8 = 0;
const SLOT_ALLOCATED: u8 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct SlotHeader {
    data_offset: U32,
    size: U32,
    status: u8,
}

const _: () = assert!(size_of::<SlotHeader>() == SLOT_HEADER_SIZE);

impl SlotHeader {
    fn is_free(&self) -> bool {
        self.status == SLOT_FREE
    }
}

fn slot_header_offset(index: u16) -> usize {
    ALLOCATOR_HEADER_SIZE + index as usize * SLOT_HEADER_SIZE
}

/// Read-only view over a slotted data area.
///
/// Everything that does not mutate the page goes through this type, so row
/// readers can operate under a shared lock while [`SlotAllocator`] requires
/// exclusive access.
#[derive(Clone, Copy)]
pub struct SlotDirectory<'a> {
    buffer: &'a [u8],
}

impl<'a> SlotDirectory<'a> {
    pub fn new(buffer: &'a [u8]) -> Result<Self> {
        ensure!(
            buffer.len() >= ALLOCATOR_HEADER_SIZE,
            "buffer too small for slot directory: {} bytes",
            buffer.len()
        );
        ensure!(
            buffer.len() <= i32::MAX as usize,
            "buffer too large for slot directory: {} bytes",
            buffer.len()
        );
        Ok(Self { buffer })
    }

    pub fn slots_allocated(&self) -> u16 {
        // The constructor guarantees the two header bytes exist.
        let (count, _) = encoding::read_u16(self.buffer).unwrap_or((0, 0));
        count
    }

    fn header_at(&self, index: u16) -> Result<SlotHeader> {
        let slots = self.slots_allocated();
        ensure!(
            index < slots,
            "invalid slot index {}, exceeds allocated slots count {}",
            index,
            slots
        );

        let offset = slot_header_offset(index);
        ensure!(
            offset + SLOT_HEADER_SIZE <= self.buffer.len(),
            "slot header {} out of bounds",
            index
        );

        let header = SlotHeader::ref_from_bytes(&self.buffer[offset..offset + SLOT_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse slot header {}: {:?}", index, e))?;
        Ok(*header)
    }

    fn payload_bounds(&self, header: &SlotHeader) -> Result<(usize, usize)> {
        let start = header.data_offset.get() as usize;
        let end = start + header.size.get() as usize;
        ensure!(
            end <= self.buffer.len(),
            "slot payload [{}, {}) exceeds data area of {} bytes",
            start,
            end,
            self.buffer.len()
        );
        Ok((start, end))
    }

    /// Payload of an allocated slot; out-of-range or free slots are errors.
    pub fn allocation(&self, index: u16) -> Result<&'a [u8]> {
        let header = self.header_at(index)?;
        ensure!(!header.is_free(), "slot {} is not allocated", index);
        let (start, end) = self.payload_bounds(&header)?;
        Ok(&self.buffer[start..end])
    }

    /// Visits allocated slots in ascending index order until `visit`
    /// returns `false`.
    pub fn visit_allocations<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(u16, &'a [u8]) -> bool,
    {
        for index in 0..self.slots_allocated() {
            let header = self.header_at(index)?;
            if header.is_free() {
                continue;
            }
            let (start, end) = self.payload_bounds(&header)?;
            if !visit(index, &self.buffer[start..end]) {
                return Ok(());
            }
        }
        Ok(())
    }

    fn lowest_payload_offset(&self) -> Result<usize> {
        let slots = self.slots_allocated();
        if slots == 0 {
            return Ok(self.buffer.len());
        }
        let last = self.header_at(slots - 1)?;
        Ok(last.data_offset.get() as usize)
    }

    /// Raw gap between the end of the header array and the lowest payload.
    fn tail_region(&self) -> Result<u32> {
        let next_header = slot_header_offset(self.slots_allocated());
        let lowest = self.lowest_payload_offset()?;
        Ok(lowest.saturating_sub(next_header) as u32)
    }

    /// Largest tail allocation that still leaves room for the *following*
    /// slot header. Reusing a free slot needs no such margin.
    fn allocatable_tail(&self) -> Result<u32> {
        let slots = self.slots_allocated();
        if slots == 0 {
            return Ok((self.buffer.len() - ALLOCATOR_HEADER_SIZE) as u32);
        }
        let lowest = self.lowest_payload_offset()?;
        let reserved = slot_header_offset(slots + 1);
        Ok(lowest.saturating_sub(reserved) as u32)
    }

    /// Tail gap plus the capacities of every free slot.
    pub fn free_bytes(&self) -> Result<u32> {
        let mut total = self.tail_region()?;
        for index in 0..self.slots_allocated() {
            let header = self.header_at(index)?;
            if header.is_free() {
                total += header.size.get();
            }
        }
        Ok(total)
    }

    /// Largest single allocation the page can currently admit.
    pub fn largest_allocatable(&self) -> Result<u32> {
        let mut largest = self.allocatable_tail()?;
        for index in 0..self.slots_allocated() {
            let header = self.header_at(index)?;
            if header.is_free() && header.size.get() > largest {
                largest = header.size.get();
            }
        }
        Ok(largest)
    }

    pub fn can_fit(&self, size: u32) -> bool {
        match self.largest_allocatable() {
            Ok(largest) => size <= largest,
            Err(e) => {
                log::warn!("can_fit failed to inspect slot headers: {e}");
                false
            }
        }
    }
}

/// Mutating allocator over a slotted data area.
///
/// Loads the free list by scanning slot headers at construction; the page
/// itself persists nothing about the list.
pub struct SlotAllocator<'a> {
    buffer: &'a mut [u8],
    free: FreeList,
}

impl<'a> SlotAllocator<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Result<Self> {
        SlotDirectory::new(buffer)?;

        let mut allocator = Self {
            buffer,
            free: FreeList::new(),
        };
        allocator.load_free_list()?;
        Ok(allocator)
    }

    fn load_free_list(&mut self) -> Result<()> {
        let directory = SlotDirectory { buffer: self.buffer };
        let mut free = FreeList::new();
        for index in 0..directory.slots_allocated() {
            let header = directory.header_at(index)?;
            if header.is_free() && !free.insert(index, header.size.get()) {
                log::warn!("duplicate free slot {index} while loading free list");
            }
        }
        self.free = free;
        Ok(())
    }

    pub fn directory(&self) -> SlotDirectory<'_> {
        SlotDirectory { buffer: self.buffer }
    }

    pub fn slots_allocated(&self) -> u16 {
        self.directory().slots_allocated()
    }

    /// Like [`SlotDirectory::free_bytes`], but sums free-slot capacities
    /// from the in-memory list instead of re-scanning the headers.
    pub fn free_bytes(&self) -> Result<u32> {
        let mut total = self.directory().tail_region()?;
        self.free.visit(|_, capacity| {
            total += capacity;
            true
        });
        Ok(total)
    }

    pub fn largest_allocatable(&self) -> Result<u32> {
        let mut largest = self.directory().allocatable_tail()?;
        self.free.visit(|_, capacity| {
            if capacity > largest {
                largest = capacity;
            }
            true
        });
        Ok(largest)
    }

    pub fn can_fit(&self, size: u32) -> bool {
        match self.largest_allocatable() {
            Ok(largest) => size <= largest,
            Err(e) => {
                log::warn!("can_fit failed to inspect slot headers: {e}");
                false
            }
        }
    }

    pub fn allocation(&self, index: u16) -> Result<&[u8]> {
        self.directory().allocation(index)
    }

    /// Mutable payload of an allocated slot.
    pub fn allocation_mut(&mut self, index: u16) -> Result<&mut [u8]> {
        let header = self.directory().header_at(index)?;
        ensure!(!header.is_free(), "slot {} is not allocated", index);
        let (start, end) = self.directory().payload_bounds(&header)?;
        Ok(&mut self.buffer[start..end])
    }

    /// Allocates `size` bytes, preferring the tightest-fitting free slot and
    /// falling back to a fresh slot at the tail. Returns the slot index and
    /// a mutable sub-slice of exactly `size` bytes.
    pub fn allocate(&mut self, size: u32) -> Result<(u16, &mut [u8])> {
        let (index, data_offset) = match self.claim_free_slot(size)? {
            Some(claimed) => claimed,
            None => self.push_tail_slot(size)?,
        };

        let start = data_offset as usize;
        Ok((index, &mut self.buffer[start..start + size as usize]))
    }

    /// Marks the slot free, zeroes its payload and returns it to the free
    /// list.
    pub fn deallocate(&mut self, index: u16) -> Result<()> {
        let header = self.directory().header_at(index)?;
        ensure!(!header.is_free(), "slot {} is already free", index);

        let offset = slot_header_offset(index);
        let raw = SlotHeader::mut_from_bytes(&mut self.buffer[offset..offset + SLOT_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse slot header {}: {:?}", index, e))?;
        raw.status = SLOT_FREE;

        let start = header.data_offset.get() as usize;
        let end = start + header.size.get() as usize;
        self.buffer[start..end].fill(0);

        if !self.free.insert(index, header.size.get()) {
            log::warn!("slot {index} was already on the free list");
            debug_assert!(false, "duplicate free-list entry for slot {index}");
        }
        Ok(())
    }

    fn claim_free_slot(&mut self, size: u32) -> Result<Option<(u16, u32)>> {
        loop {
            let Some((index, _)) = self.free.first_fit(size) else {
                return Ok(None);
            };

            let header = self.directory().header_at(index)?;
            if !header.is_free() || header.size.get() < size {
                // Stale reference; drop it and keep searching.
                log::warn!("free list held a stale reference to slot {index}, removing");
                self.free.remove(index);
                continue;
            }

            let offset = slot_header_offset(index);
            let raw =
                SlotHeader::mut_from_bytes(&mut self.buffer[offset..offset + SLOT_HEADER_SIZE])
                    .map_err(|e| eyre::eyre!("failed to parse slot header {}: {:?}", index, e))?;
            raw.status = SLOT_ALLOCATED;

            self.free.remove(index);
            return Ok(Some((index, header.data_offset.get())));
        }
    }

    fn push_tail_slot(&mut self, size: u32) -> Result<(u16, u32)> {
        let directory = SlotDirectory { buffer: self.buffer };
        let slots = directory.slots_allocated();
        let allocatable = directory.allocatable_tail()?;
        ensure!(
            size <= allocatable,
            "insufficient space to allocate {} bytes, {} allocatable",
            size,
            allocatable
        );

        let data_offset = (directory.lowest_payload_offset()? - size as usize) as u32;

        let header = SlotHeader {
            data_offset: U32::new(data_offset),
            size: U32::new(size),
            status: SLOT_ALLOCATED,
        };
        let offset = slot_header_offset(slots);
        self.buffer[offset..offset + SLOT_HEADER_SIZE].copy_from_slice(header.as_bytes());
        encoding::write_u16(self.buffer, slots + 1)?;

        Ok((slots, data_offset))
    }
}
