//! # Database API
//!
//! The public entry point: open a file, register tables, and read or write
//! rows through table handles. This layer composes the pager, the metadata
//! catalog and row pages into typed record storage. There is no query
//! language, planner or index here; callers drive the engine
//! programmatically.
//!
//! ## Insert Path
//!
//! ```text
//! TableHandle::insert
//!     │  resolve descriptor from the metadata page
//!     ▼
//! walk the table's data pages ── a page fits ──> allocate a slot,
//!     │                                          serialize the items
//!     ▼ none fit
//! append a fresh Row page, insert there, record the page id in the
//! table descriptor and re-serialize the catalog
//! ```
//!
//! ## Handles Are Names
//!
//! A [`TableHandle`] stores only the table name and re-reads its descriptor
//! from the metadata page on every operation, so a handle never goes stale
//! when inserts grow the table's page list.
//!
//! ## Durability
//!
//! Writes land in the buffer pool and reach the file on eviction, on
//! [`Database::sync`], and on [`Database::close`]. There is no write-ahead
//! log; a crash between syncs can lose or tear recent writes.
//!
//! ## Usage
//!
//! ```ignore
//! use slotdb::{ColumnDescriptor, Database, Item, ItemType, TableDescriptor};
//!
//! let db = Database::open("./app.db")?;
//! db.add_table(TableDescriptor::new(
//!     "users",
//!     vec![
//!         ColumnDescriptor::new("id", ItemType::Integer),
//!         ColumnDescriptor::new("name", ItemType::String),
//!     ],
//! ))?;
//!
//! let users = db.table("users")?;
//! let tid = users.insert(&[Item::Integer(42), Item::from("Alice")])?;
//! let rows = users.select_all()?;
//! db.close()?;
//! ```

use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use crate::config::DEFAULT_POOL_CAPACITY;
use crate::item::{Item, ItemView};
use crate::storage::frame::PageType;
use crate::storage::metadata::TableDescriptor;
use crate::storage::pager::Pager;
use crate::storage::row::{RowPage, RowPageMut, RowSchema};
use crate::storage::{PageId, SlotId};

/// Tuple identifier: the page and slot a row lives in. Packable into a
/// `u64` for callers that want an opaque handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tid {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl Tid {
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }

    pub fn as_u64(&self) -> u64 {
        (self.page_id as u64) << 16 | self.slot as u64
    }

    pub fn from_u64(packed: u64) -> Self {
        Self {
            page_id: (packed >> 16) as u32,
            slot: (packed & 0xFFFF) as u16,
        }
    }
}

/// Configures and opens a [`Database`].
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    path: Option<PathBuf>,
    pool_capacity: usize,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self {
            path: None,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Number of frames in the buffer pool. Must be at least 2 so a data
    /// page and the metadata page can be resident together.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn open(self) -> Result<Database> {
        let path = self
            .path
            .ok_or_else(|| eyre::eyre!("database path is required"))?;
        ensure!(
            self.pool_capacity >= 2,
            "pool capacity {} is too small, need at least 2 frames",
            self.pool_capacity
        );

        let pager = Pager::open(&path, self.pool_capacity)
            .wrap_err_with(|| format!("failed to open database at {}", path.display()))?;
        Ok(Database { pager })
    }
}

pub struct Database {
    pager: Pager,
}

impl Database {
    /// Opens or creates a database file with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path).open()
    }

    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Registers a table. Fails if a table with the same name exists.
    pub fn add_table(&self, table: TableDescriptor) -> Result<()> {
        let name = table.name.clone();
        self.pager
            .metadata()?
            .add_table(table)
            .wrap_err_with(|| format!("unable to add table '{name}'"))
    }

    /// Drops a table from the catalog. Its data pages stay in the file;
    /// there is no page-level reclamation.
    pub fn remove_table(&self, name: &str) -> Result<()> {
        self.pager
            .metadata()?
            .remove_table(name)
            .wrap_err_with(|| format!("unable to remove table '{name}'"))
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.pager.metadata()?.find_table(name).is_some())
    }

    /// Handle for an existing table.
    pub fn table(&self, name: &str) -> Result<TableHandle<'_>> {
        let metadata = self.pager.metadata()?;
        metadata.table(name)?;
        Ok(TableHandle {
            db: self,
            name: name.to_string(),
        })
    }

    pub fn tables(&self) -> Result<Vec<String>> {
        Ok(self
            .pager
            .metadata()?
            .tables()
            .iter()
            .map(|t| t.name.clone())
            .collect())
    }

    /// Flushes every dirty page to disk and syncs the file.
    pub fn sync(&self) -> Result<()> {
        self.pager.sync()
    }

    /// Flushes all dirty pages and closes the file.
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    pub(crate) fn pager(&self) -> &Pager {
        &self.pager
    }
}

/// A by-name reference to a table. Cheap to create; resolves its descriptor
/// from the metadata page on every operation.
pub struct TableHandle<'db> {
    db: &'db Database,
    name: String,
}

impl TableHandle<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> Result<TableDescriptor> {
        Ok(self.db.pager().metadata()?.table(&self.name)?.clone())
    }

    fn ensure_owned_page(&self, descriptor: &TableDescriptor, page_id: PageId) -> Result<()> {
        ensure!(
            descriptor.data_pages.contains(&page_id),
            "page {} does not belong to table '{}'",
            page_id,
            self.name
        );
        Ok(())
    }

    /// Inserts one row, spilling to a fresh data page when no existing page
    /// has room.
    pub fn insert(&self, values: &[Item]) -> Result<Tid> {
        let descriptor = self.descriptor()?;
        ensure!(
            values.len() == descriptor.columns.len(),
            "column count mismatch for table '{}': want {}, got {}",
            self.name,
            descriptor.columns.len(),
            values.len()
        );
        let schema = descriptor.row_schema();

        for &page_id in &descriptor.data_pages {
            let guard = self.db.pager().fetch(page_id).wrap_err_with(|| {
                format!("unable to load row page {page_id} of table '{}'", self.name)
            })?;

            // Probe under the read lock; full pages stay clean.
            let fits = {
                let page_data = guard.read();
                RowPage::new(page_data.data(), &schema)?.can_fit_items(values)
            };
            if !fits {
                continue;
            }

            let mut page_data = guard.write();
            let mut page = RowPageMut::new(page_data.data_mut(), &schema)?;
            let slot = page.insert(values)?;
            return Ok(Tid::new(page_id, slot));
        }

        self.insert_into_new_page(descriptor, &schema, values)
    }

    fn insert_into_new_page(
        &self,
        mut descriptor: TableDescriptor,
        schema: &RowSchema,
        values: &[Item],
    ) -> Result<Tid> {
        let guard = self
            .db
            .pager()
            .append(PageType::Row)
            .wrap_err_with(|| format!("unable to grow table '{}'", self.name))?;
        let page_id = guard.id();

        let slot = {
            let mut page_data = guard.write();
            let mut page = RowPageMut::new(page_data.data_mut(), schema)?;
            page.insert(values)?
        };

        descriptor.data_pages.push(page_id);
        self.db
            .pager()
            .metadata()?
            .update_table(descriptor)
            .wrap_err_with(|| format!("unable to record new data page for '{}'", self.name))?;

        Ok(Tid::new(page_id, slot))
    }

    /// Decoded row at `tid`.
    pub fn fetch(&self, tid: Tid) -> Result<Vec<Item>> {
        let descriptor = self.descriptor()?;
        self.ensure_owned_page(&descriptor, tid.page_id)?;
        let schema = descriptor.row_schema();

        let guard = self.db.pager().fetch(tid.page_id)?;
        let page_data = guard.read();
        let page = RowPage::new(page_data.data(), &schema)?;

        let views = page.fetch(tid.slot)?;
        views.iter().map(ItemView::to_item).collect()
    }

    /// Rewrites the row at `tid`. The row may move to a different slot of
    /// the same page when its size changes; the returned [`Tid`] is
    /// authoritative. If the page can no longer hold the new row the update
    /// fails and the row is lost from the page; callers that need
    /// migration must re-insert.
    pub fn update(&self, tid: Tid, values: &[Item]) -> Result<Tid> {
        let descriptor = self.descriptor()?;
        ensure!(
            values.len() == descriptor.columns.len(),
            "column count mismatch for table '{}': want {}, got {}",
            self.name,
            descriptor.columns.len(),
            values.len()
        );
        self.ensure_owned_page(&descriptor, tid.page_id)?;
        let schema = descriptor.row_schema();

        let guard = self.db.pager().fetch(tid.page_id)?;
        let mut page_data = guard.write();
        let mut page = RowPageMut::new(page_data.data_mut(), &schema)?;

        let slot = page.update(tid.slot, values)?;
        Ok(Tid::new(tid.page_id, slot))
    }

    /// Removes the row at `tid`.
    pub fn delete(&self, tid: Tid) -> Result<()> {
        let descriptor = self.descriptor()?;
        self.ensure_owned_page(&descriptor, tid.page_id)?;
        let schema = descriptor.row_schema();

        let guard = self.db.pager().fetch(tid.page_id)?;
        let mut page_data = guard.write();
        let mut page = RowPageMut::new(page_data.data_mut(), &schema)?;
        page.delete(tid.slot)
    }

    /// Every row of the table, decoded, in page order then slot order.
    /// A full-scan debug facility with no predicate pushdown.
    pub fn select_all(&self) -> Result<Vec<Vec<Item>>> {
        let descriptor = self.descriptor()?;
        let schema = descriptor.row_schema();
        let mut rows = Vec::new();

        for &page_id in &descriptor.data_pages {
            let guard = self.db.pager().fetch(page_id).wrap_err_with(|| {
                format!("unable to load row page {page_id} of table '{}'", self.name)
            })?;
            let page_data = guard.read();
            let page = RowPage::new(page_data.data(), &schema)?;

            page.iter_rows(|slot, views| {
                match views.iter().map(ItemView::to_item).collect::<Result<Vec<_>>>() {
                    Ok(row) => rows.push(row),
                    Err(e) => log::warn!("skipping row {page_id}/{slot}: {e}"),
                }
                true
            })?;
        }

        Ok(rows)
    }
}
