//! # Row Pages
//!
//! A row page stores serialized rows in slot payloads managed by the
//! sandwich allocator. The page itself persists no schema; the catalog
//! owns it, and callers supply a [`RowSchema`] when wrapping a page.
//!
//! Reads and writes are split the way the allocator splits them:
//! [`RowPage`] wraps a shared borrow of the data area (fetch, iterate,
//! space queries) and [`RowPageMut`] an exclusive one (insert, update,
//! delete). The owning frame's block lock provides the corresponding
//! shared/exclusive access.
//!
//! Rows are item views into the page, valid for as long as the borrow of
//! the data area; decoding to owned values is the caller's choice.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use super::allocator::{SlotAllocator, SlotDirectory};
use super::SlotId;
use crate::item::{self, Item, ItemType, ItemView};

/// Ordered column types of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    columns: Vec<ItemType>,
}

impl RowSchema {
    pub fn new(columns: Vec<ItemType>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ItemType] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// One decoded row: a view per column, borrowing the page.
pub type RowViews<'a> = SmallVec<[ItemView<'a>; 8]>;

fn decode_row<'a>(buffer: &'a [u8], schema: &RowSchema) -> Result<RowViews<'a>> {
    let mut views = RowViews::new();
    let mut offset = 0;

    for (index, &item_type) in schema.columns().iter().enumerate() {
        let len = item_type
            .len_in(&buffer[offset.min(buffer.len())..])
            .map_err(|e| eyre::eyre!("unable to size item {}: {}", index, e))?;
        ensure!(
            offset + len <= buffer.len(),
            "item {} extends past the slot payload",
            index
        );
        views.push(ItemView::new(&buffer[offset..offset + len], item_type));
        offset += len;
    }

    Ok(views)
}

fn row_size(items: &[Item]) -> Result<u32> {
    let size = item::items_len(items);
    u32::try_from(size).map_err(|_| eyre::eyre!("row of {} bytes is not addressable", size))
}

/// Read-only wrapper over a row page's data area.
pub struct RowPage<'a> {
    directory: SlotDirectory<'a>,
    schema: &'a RowSchema,
}

impl<'a> RowPage<'a> {
    pub fn new(data: &'a [u8], schema: &'a RowSchema) -> Result<Self> {
        Ok(Self {
            directory: SlotDirectory::new(data)?,
            schema,
        })
    }

    /// Item views for the row in `slot`.
    pub fn fetch(&self, slot: SlotId) -> Result<RowViews<'a>> {
        let payload = self.directory.allocation(slot)?;
        decode_row(payload, self.schema)
    }

    /// Visits rows in ascending slot order until `visit` returns `false`.
    /// Slots that no longer decode under the schema are skipped.
    pub fn iter_rows<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(SlotId, &RowViews<'a>) -> bool,
    {
        self.directory.visit_allocations(|slot, payload| {
            match decode_row(payload, self.schema) {
                Ok(views) => visit(slot, &views),
                Err(e) => {
                    log::warn!("skipping undecodable row in slot {slot}: {e}");
                    true
                }
            }
        })
    }

    pub fn slots_count(&self) -> u16 {
        self.directory.slots_allocated()
    }

    pub fn free_bytes(&self) -> Result<u32> {
        self.directory.free_bytes()
    }

    pub fn largest_allocatable(&self) -> Result<u32> {
        self.directory.largest_allocatable()
    }

    pub fn can_fit(&self, size: u32) -> bool {
        self.directory.can_fit(size)
    }

    pub fn can_fit_items(&self, items: &[Item]) -> bool {
        match row_size(items) {
            Ok(size) => self.can_fit(size),
            Err(_) => false,
        }
    }
}

/// Mutating wrapper over a row page's data area.
pub struct RowPageMut<'a> {
    allocator: SlotAllocator<'a>,
    schema: &'a RowSchema,
}

impl<'a> RowPageMut<'a> {
    pub fn new(data: &'a mut [u8], schema: &'a RowSchema) -> Result<Self> {
        Ok(Self {
            allocator: SlotAllocator::new(data)?,
            schema,
        })
    }

    /// Serializes `items` into a fresh slot and returns its index. Callers
    /// check `can_fit_items` first; an allocation failure surfaces as an
    /// error either way. Item count and types are the table layer's
    /// responsibility.
    pub fn insert(&mut self, items: &[Item]) -> Result<SlotId> {
        let size = row_size(items)?;
        let (slot, buffer) = self.allocator.allocate(size)?;
        let written = item::encode_items(items, buffer)?;
        debug_assert_eq!(written, size as usize);
        Ok(slot)
    }

    /// Overwrites in place when the serialized size matches the slot's
    /// capacity, otherwise deallocates and re-allocates, so the returned
    /// slot index may differ from `slot`. If the re-allocation fails the row is
    /// gone from this page; migrating it elsewhere is the caller's job.
    pub fn update(&mut self, slot: SlotId, items: &[Item]) -> Result<SlotId> {
        let new_size = item::items_len(items);
        let existing = self.allocator.allocation(slot)?.len();

        if new_size == existing {
            let buffer = self.allocator.allocation_mut(slot)?;
            item::encode_items(items, buffer)?;
            return Ok(slot);
        }

        self.allocator.deallocate(slot)?;
        let (new_slot, buffer) = self.allocator.allocate(row_size(items)?)?;
        item::encode_items(items, buffer)?;
        Ok(new_slot)
    }

    pub fn delete(&mut self, slot: SlotId) -> Result<()> {
        self.allocator.deallocate(slot)
    }

    pub fn fetch(&self, slot: SlotId) -> Result<RowViews<'_>> {
        let payload = self.allocator.allocation(slot)?;
        decode_row(payload, self.schema)
    }

    pub fn slots_count(&self) -> u16 {
        self.allocator.slots_allocated()
    }

    pub fn free_bytes(&self) -> Result<u32> {
        self.allocator.free_bytes()
    }

    pub fn can_fit_items(&self, items: &[Item]) -> bool {
        match row_size(items) {
            Ok(size) => self.allocator.can_fit(size),
            Err(_) => false,
        }
    }
}
