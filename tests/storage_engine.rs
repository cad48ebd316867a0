//! End-to-end scenarios across the pager, catalog and table layers.

use slotdb::{ColumnDescriptor, Database, Item, ItemType, TableDescriptor, Tid};
use tempfile::tempdir;

fn users_descriptor() -> TableDescriptor {
    TableDescriptor::new(
        "users",
        vec![
            ColumnDescriptor::new("id", ItemType::Integer),
            ColumnDescriptor::new("name", ItemType::String),
        ],
    )
}

#[test]
fn create_insert_close_reopen_read_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.db");

    {
        let db = Database::open(&path).unwrap();
        db.add_table(users_descriptor()).unwrap();
        let users = db.table("users").unwrap();
        users
            .insert(&[Item::Integer(42), Item::from("Alice")])
            .unwrap();
        db.close().unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert!(db.table_exists("users").unwrap());

    let rows = db.table("users").unwrap().select_all().unwrap();
    assert_eq!(rows, vec![vec![Item::Integer(42), Item::from("Alice")]]);
}

#[test]
fn filling_a_page_spills_to_a_second_data_page() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.db");

    {
        let db = Database::open(&path).unwrap();
        db.add_table(users_descriptor()).unwrap();
        let users = db.table("users").unwrap();

        // 16-byte rows (8 for the integer, 4 + 4 for the string) plus a
        // 9-byte slot header: a 4090-byte data area tops out at 163 rows.
        for i in 0..200 {
            users.insert(&[Item::Integer(i), Item::from("abcd")]).unwrap();
        }

        let rows = users.select_all().unwrap();
        assert_eq!(rows.len(), 200);
        db.close().unwrap();
    }

    let db = Database::open(&path).unwrap();

    // Metadata page + two data pages.
    let file_len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(file_len, 3 * 4096);

    let rows = db.table("users").unwrap().select_all().unwrap();
    assert_eq!(rows.len(), 200);
    assert_eq!(rows[0], vec![Item::Integer(0), Item::from("abcd")]);
    assert_eq!(rows[199], vec![Item::Integer(199), Item::from("abcd")]);
}

#[test]
fn deleted_rows_free_slots_for_reuse() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("app.db")).unwrap();
    db.add_table(users_descriptor()).unwrap();
    let users = db.table("users").unwrap();

    users.insert(&[Item::Integer(1), Item::from("first")]).unwrap();
    let second = users
        .insert(&[Item::Integer(2), Item::from("second")])
        .unwrap();
    users.insert(&[Item::Integer(3), Item::from("third")]).unwrap();

    users.delete(second).unwrap();

    // A smaller row lands in the freed slot instead of a new one.
    let reused = users.insert(&[Item::Integer(4), Item::from("4th")]).unwrap();
    assert_eq!(reused, Tid::new(second.page_id, second.slot));

    let ids: Vec<i64> = users
        .select_all()
        .unwrap()
        .iter()
        .map(|row| match row[0] {
            Item::Integer(v) => v,
            _ => panic!("expected an integer id"),
        })
        .collect();
    assert_eq!(ids, vec![1, 4, 3]);
}

#[test]
fn update_moves_rows_only_when_the_size_changes() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("app.db")).unwrap();
    db.add_table(users_descriptor()).unwrap();
    let users = db.table("users").unwrap();

    let tid = users
        .insert(&[Item::Integer(42), Item::from("Alice")])
        .unwrap();

    // Same serialized size: the row stays put.
    let same = users
        .update(tid, &[Item::Integer(7), Item::from("Brice")])
        .unwrap();
    assert_eq!(same, tid);

    // Different size: the slot may change, the returned tid is the truth.
    let moved = users
        .update(same, &[Item::Integer(7), Item::from("Bob")])
        .unwrap();
    assert_eq!(
        users.fetch(moved).unwrap(),
        vec![Item::Integer(7), Item::from("Bob")]
    );
}

#[test]
fn tiny_buffer_pool_survives_heavy_spilling() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.db");

    {
        let db = Database::builder()
            .path(&path)
            .pool_capacity(2)
            .open()
            .unwrap();
        db.add_table(users_descriptor()).unwrap();
        let users = db.table("users").unwrap();

        // Every page fault evicts the other frame, so dirty pages are
        // constantly written back while the table grows.
        for i in 0..500 {
            users
                .insert(&[Item::Integer(i), Item::from("payload-payload")])
                .unwrap();
        }
        db.close().unwrap();
    }

    let db = Database::builder()
        .path(&path)
        .pool_capacity(2)
        .open()
        .unwrap();
    let rows = db.table("users").unwrap().select_all().unwrap();
    assert_eq!(rows.len(), 500);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[0], Item::Integer(i as i64));
    }
}

#[test]
fn duplicate_tables_are_rejected_and_the_catalog_is_unchanged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.db");

    {
        let db = Database::open(&path).unwrap();
        db.add_table(users_descriptor()).unwrap();

        let mut other = users_descriptor();
        other.columns.push(ColumnDescriptor::new("extra", ItemType::Bytes));
        let err = db.add_table(other).unwrap_err();
        assert!(format!("{err:?}").contains("already exists"));
        db.close().unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.tables().unwrap(), vec!["users".to_string()]);

    // The surviving descriptor is the original two-column one.
    let users = db.table("users").unwrap();
    assert!(users.insert(&[Item::Integer(1)]).is_err());
    users.insert(&[Item::Integer(1), Item::from("ok")]).unwrap();
}

#[test]
fn catalog_round_trips_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.db");

    {
        let db = Database::open(&path).unwrap();
        db.add_table(users_descriptor()).unwrap();
        db.add_table(TableDescriptor::new(
            "blobs",
            vec![ColumnDescriptor::new("payload", ItemType::Bytes)],
        ))
        .unwrap();
        db.add_table(TableDescriptor::new("empty", Vec::new())).unwrap();
        db.close().unwrap();
    }

    let db = Database::open(&path).unwrap();
    let mut tables = db.tables().unwrap();
    tables.sort();
    assert_eq!(tables, vec!["blobs", "empty", "users"]);

    // A zero-column table accepts zero-item rows.
    let empty = db.table("empty").unwrap();
    empty.insert(&[]).unwrap();
    assert_eq!(empty.select_all().unwrap(), vec![Vec::<Item>::new()]);
}

#[test]
fn bytes_columns_hold_arbitrary_binary_data() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("app.db")).unwrap();
    db.add_table(TableDescriptor::new(
        "blobs",
        vec![
            ColumnDescriptor::new("id", ItemType::Integer),
            ColumnDescriptor::new("payload", ItemType::Bytes),
        ],
    ))
    .unwrap();

    let blobs = db.table("blobs").unwrap();
    let payload: Vec<u8> = (0..=255).collect();
    let tid = blobs
        .insert(&[Item::Integer(1), Item::Bytes(payload.clone())])
        .unwrap();

    assert_eq!(
        blobs.fetch(tid).unwrap(),
        vec![Item::Integer(1), Item::Bytes(payload)]
    );
}
