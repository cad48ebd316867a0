//! # slotdb: Embedded Slotted-Page Storage Engine
//!
//! A small, single-file relational storage engine: tables are sets of typed
//! rows stored across a chain of slotted heap pages, cached by a
//! fixed-capacity buffer pool with clock replacement. There is no SQL, no
//! B-tree and no transaction layer; callers drive the engine through a
//! programmatic API, and higher layers are expected to bring their own
//! query machinery.
//!
//! ## Quick Start
//!
//! ```ignore
//! use slotdb::{ColumnDescriptor, Database, Item, ItemType, TableDescriptor};
//!
//! let db = Database::builder()
//!     .path("./app.db")
//!     .pool_capacity(64)
//!     .open()?;
//!
//! db.add_table(TableDescriptor::new(
//!     "users",
//!     vec![
//!         ColumnDescriptor::new("id", ItemType::Integer),
//!         ColumnDescriptor::new("name", ItemType::String),
//!     ],
//! ))?;
//!
//! let users = db.table("users")?;
//! users.insert(&[Item::Integer(42), Item::from("Alice")])?;
//!
//! for row in users.select_all()? {
//!     println!("{row:?}");
//! }
//! db.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │       Public API (Database)         │
//! ├─────────────────────────────────────┤
//! │  Table handles │ Metadata catalog   │
//! ├─────────────────────────────────────┤
//! │   Row pages + item serialization    │
//! ├─────────────────────────────────────┤
//! │     Slot allocator (per page)       │
//! ├─────────────────────────────────────┤
//! │  Pager + clock buffer pool (4 KiB)  │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! One file, a dense array of 4096-byte pages. Page 0 is the metadata page
//! (total page count plus one descriptor per table); every other page is a
//! row page whose data area is managed by a two-ended slot allocator.
//! All on-disk integers are big-endian.
//!
//! ## Module Overview
//!
//! - [`storage`]: pager, buffer pool, slot allocator, metadata and row pages
//! - [`item`]: the three primitive item types and their zero-copy views
//! - [`encoding`]: big-endian integer and varchar codec
//! - [`database`]: `Database`, `DatabaseBuilder`, `TableHandle`, `Tid`
//! - [`config`]: page size, pool capacity and name-budget constants

pub mod config;
pub mod database;
pub mod encoding;
pub mod item;
pub mod storage;

pub use database::{Database, DatabaseBuilder, TableHandle, Tid};
pub use item::{Item, ItemType, ItemView};
pub use storage::{ColumnDescriptor, PageId, RowSchema, SlotId, TableDescriptor};
