//! Smoke demo: create a table, insert a few rows, scan them back.
//!
//! ```text
//! cargo run --bin slotdb [path]
//! ```

use eyre::Result;
use slotdb::{ColumnDescriptor, Database, Item, ItemType, TableDescriptor};

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "slotdb.data".to_string());

    let db = Database::open(&path)?;

    if !db.table_exists("users")? {
        db.add_table(TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::new("id", ItemType::Integer),
                ColumnDescriptor::new("name", ItemType::String),
                ColumnDescriptor::new("avatar", ItemType::Bytes),
            ],
        ))?;
        println!("created table 'users'");
    }

    let users = db.table("users")?;
    let existing = users.select_all()?.len() as i64;

    for (offset, name) in ["Alice", "Bob", "Carol"].iter().enumerate() {
        let id = existing + offset as i64;
        let tid = users.insert(&[
            Item::Integer(id),
            Item::from(*name),
            Item::Bytes(vec![0x89, 0x50, 0x4E, 0x47]),
        ])?;
        println!("inserted {name} at page {} slot {}", tid.page_id, tid.slot);
    }

    println!("-- {} --", path);
    for row in users.select_all()? {
        println!("{row:?}");
    }

    db.close()
}
