//! # Metadata Page
//!
//! Page 0 is the catalog: it records the file's total page count and one
//! descriptor per table. The whole structure is re-serialized into the data
//! area after every mutation; at this scale the catalog is a few hundred
//! bytes and simplicity wins.
//!
//! ## Data Area Layout
//!
//! ```text
//! pages_count: u32 BE
//! table_count: u16 BE
//! table descriptor × table_count
//! ```
//!
//! Table descriptor:
//!
//! ```text
//! column_count: u16 BE
//! column descriptor × column_count     (type: u8, name: varchar)
//! data_page_count: u16 BE
//! page id: u32 BE × data_page_count
//! name: varchar
//! ```
//!
//! Table and column names budget 64 bytes *encoded*, i.e. the 4-byte
//! varchar header plus at most 60 bytes of UTF-8.

use eyre::{bail, ensure, Result};

use super::frame::PageType;
use super::pager::PageGuard;
use super::row::RowSchema;
use crate::config::{MAX_NAME_LEN, PAGE_DATA_SIZE};
use crate::encoding;
use crate::item::ItemType;

fn encode_name(buf: &mut [u8], name: &str) -> Result<usize> {
    let encoded = encoding::varchar_len_of(name.as_bytes());
    ensure!(
        encoded <= MAX_NAME_LEN,
        "name '{}' exceeds the {} byte budget ({} encoded)",
        name,
        MAX_NAME_LEN,
        encoded
    );
    encoding::write_varchar(buf, name.as_bytes())
}

fn parse_name(buf: &[u8]) -> Result<(String, usize)> {
    let encoded = encoding::varchar_len_in(buf)?;
    ensure!(
        encoded <= MAX_NAME_LEN,
        "name exceeds the {} byte budget ({} encoded)",
        MAX_NAME_LEN,
        encoded
    );
    let (bytes, read) = encoding::read_varchar(buf)?;
    let name = std::str::from_utf8(bytes)
        .map_err(|e| eyre::eyre!("name is not valid UTF-8: {}", e))?
        .to_string();
    Ok((name, read))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub item_type: ItemType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            item_type,
        }
    }

    fn encoded_len(&self) -> usize {
        1 + encoding::varchar_len_of(self.name.as_bytes())
    }

    fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = encoding::write_u8(buf, self.item_type as u8)?;
        offset += encode_name(&mut buf[offset..], &self.name)?;
        Ok(offset)
    }

    fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let (tag, mut offset) = encoding::read_u8(buf)?;
        let item_type = ItemType::from_byte(tag)?;
        let (name, read) = parse_name(&buf[offset..])?;
        offset += read;
        Ok((Self { name, item_type }, offset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub data_pages: Vec<u32>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
            data_pages: Vec::new(),
        }
    }

    /// Ordered column types, the shape row pages need.
    pub fn row_schema(&self) -> RowSchema {
        RowSchema::new(self.columns.iter().map(|c| c.item_type).collect())
    }

    pub fn encoded_len(&self) -> usize {
        let columns: usize = self.columns.iter().map(ColumnDescriptor::encoded_len).sum();
        2 + columns + 2 + 4 * self.data_pages.len() + encoding::varchar_len_of(self.name.as_bytes())
    }

    /// Checks the name budgets without serializing, so catalog mutations can
    /// fail before touching any state.
    fn validate(&self) -> Result<()> {
        ensure!(
            encoding::varchar_len_of(self.name.as_bytes()) <= MAX_NAME_LEN,
            "table name '{}' exceeds the {} byte budget",
            self.name,
            MAX_NAME_LEN
        );
        for column in &self.columns {
            ensure!(
                encoding::varchar_len_of(column.name.as_bytes()) <= MAX_NAME_LEN,
                "column name '{}' exceeds the {} byte budget",
                column.name,
                MAX_NAME_LEN
            );
        }
        ensure!(
            u16::try_from(self.columns.len()).is_ok(),
            "too many columns: {}",
            self.columns.len()
        );
        Ok(())
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        ensure!(
            buf.len() >= self.encoded_len(),
            "insufficient buffer for table descriptor '{}': {} < {}",
            self.name,
            buf.len(),
            self.encoded_len()
        );

        let mut offset = encoding::write_u16(buf, self.columns.len() as u16)?;
        for column in &self.columns {
            offset += column.encode_into(&mut buf[offset..])?;
        }

        offset += encoding::write_u16(&mut buf[offset..], self.data_pages.len() as u16)?;
        for &page_id in &self.data_pages {
            offset += encoding::write_u32(&mut buf[offset..], page_id)?;
        }

        offset += encode_name(&mut buf[offset..], &self.name)?;
        Ok(offset)
    }

    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let (column_count, mut offset) = encoding::read_u16(buf)?;
        let mut columns = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            let (column, read) = ColumnDescriptor::parse(&buf[offset..])?;
            columns.push(column);
            offset += read;
        }

        let (page_count, read) = encoding::read_u16(&buf[offset..])?;
        offset += read;
        let mut data_pages = Vec::with_capacity(page_count as usize);
        for _ in 0..page_count {
            let (page_id, read) = encoding::read_u32(&buf[offset..])?;
            data_pages.push(page_id);
            offset += read;
        }

        let (name, read) = parse_name(&buf[offset..])?;
        offset += read;

        Ok((
            Self {
                name,
                columns,
                data_pages,
            },
            offset,
        ))
    }
}

#[derive(Debug, Default)]
struct Metadata {
    pages_count: u32,
    tables: Vec<TableDescriptor>,
}

impl Metadata {
    fn encoded_len(&self) -> usize {
        4 + 2 + self
            .tables
            .iter()
            .map(TableDescriptor::encoded_len)
            .sum::<usize>()
    }

    fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        ensure!(
            buf.len() >= self.encoded_len(),
            "insufficient buffer for metadata: {} < {}",
            buf.len(),
            self.encoded_len()
        );

        let mut offset = encoding::write_u32(buf, self.pages_count)?;
        offset += encoding::write_u16(&mut buf[offset..], self.tables.len() as u16)?;
        for table in &self.tables {
            offset += table.encode_into(&mut buf[offset..])?;
        }
        Ok(offset)
    }

    fn parse(buf: &[u8]) -> Result<Self> {
        let (pages_count, mut offset) = encoding::read_u32(buf)?;
        let (table_count, read) = encoding::read_u16(&buf[offset..])?;
        offset += read;

        let mut tables = Vec::with_capacity(table_count as usize);
        for _ in 0..table_count {
            let (table, read) = TableDescriptor::parse(&buf[offset..])?;
            tables.push(table);
            offset += read;
        }

        Ok(Self {
            pages_count,
            tables,
        })
    }
}

/// Typed, pinned view over page 0. Parses the catalog at construction;
/// every mutation re-serializes it into the page and marks it dirty.
pub struct MetadataPage {
    guard: PageGuard,
    metadata: Metadata,
}

impl MetadataPage {
    pub(crate) fn new(guard: PageGuard) -> Result<Self> {
        ensure!(
            guard.page_type() == PageType::Metadata,
            "page {} is not a metadata page ({:?})",
            guard.id(),
            guard.page_type()
        );

        let metadata = Metadata::parse(guard.read().data())
            .map_err(|e| eyre::eyre!("failed to parse metadata page: {}", e))?;
        Ok(Self { guard, metadata })
    }

    fn write_back(&mut self) -> Result<()> {
        let mut page = self.guard.write();
        self.metadata.encode_into(page.data_mut())?;
        Ok(())
    }

    pub fn pages_count(&self) -> u32 {
        self.metadata.pages_count
    }

    pub fn set_pages_count(&mut self, count: u32) -> Result<()> {
        self.metadata.pages_count = count;
        self.write_back()
    }

    pub fn table_count(&self) -> usize {
        self.metadata.tables.len()
    }

    pub fn tables(&self) -> &[TableDescriptor] {
        &self.metadata.tables
    }

    pub fn find_table(&self, name: &str) -> Option<&TableDescriptor> {
        self.metadata.tables.iter().find(|t| t.name == name)
    }

    pub fn table(&self, name: &str) -> Result<&TableDescriptor> {
        self.find_table(name)
            .ok_or_else(|| eyre::eyre!("table '{}' not found", name))
    }

    /// Room left in the data area after the current catalog.
    fn fits_with(&self, extra: usize) -> Result<()> {
        let needed = self.metadata.encoded_len() + extra;
        ensure!(
            needed <= PAGE_DATA_SIZE,
            "catalog would outgrow the metadata page: {} > {}",
            needed,
            PAGE_DATA_SIZE
        );
        Ok(())
    }

    pub fn add_table(&mut self, table: TableDescriptor) -> Result<()> {
        if self.find_table(&table.name).is_some() {
            bail!("table '{}' already exists", table.name);
        }
        table.validate()?;
        self.fits_with(table.encoded_len())?;

        self.metadata.tables.push(table);
        self.write_back()
    }

    /// Replaces the descriptor with the same name. No migration of existing
    /// row data happens; the caller uses this to append data-page ids.
    pub fn update_table(&mut self, table: TableDescriptor) -> Result<()> {
        let index = self
            .metadata
            .tables
            .iter()
            .position(|t| t.name == table.name)
            .ok_or_else(|| eyre::eyre!("table '{}' not found", table.name))?;
        table.validate()?;

        let without_old = self.metadata.encoded_len() - self.metadata.tables[index].encoded_len();
        ensure!(
            without_old + table.encoded_len() <= PAGE_DATA_SIZE,
            "catalog would outgrow the metadata page"
        );

        self.metadata.tables[index] = table;
        self.write_back()
    }

    pub fn remove_table(&mut self, name: &str) -> Result<()> {
        let index = self
            .metadata
            .tables
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| eyre::eyre!("table '{}' not found", name))?;

        self.metadata.tables.swap_remove(index);
        self.write_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::new("id", ItemType::Integer),
                ColumnDescriptor::new("name", ItemType::String),
            ],
        )
    }

    #[test]
    fn table_descriptor_round_trips_byte_for_byte() {
        let mut table = users();
        table.data_pages = vec![1, 2, 9];

        let mut buf = vec![0u8; table.encoded_len()];
        let written = table.encode_into(&mut buf).unwrap();
        assert_eq!(written, table.encoded_len());

        let (parsed, read) = TableDescriptor::parse(&buf).unwrap();
        assert_eq!(read, written);
        assert_eq!(parsed, table);

        let mut again = vec![0u8; parsed.encoded_len()];
        parsed.encode_into(&mut again).unwrap();
        assert_eq!(again, buf);
    }

    #[test]
    fn zero_column_table_is_representable() {
        let table = TableDescriptor::new("marker", Vec::new());

        let mut buf = vec![0u8; table.encoded_len()];
        table.encode_into(&mut buf).unwrap();

        let (parsed, _) = TableDescriptor::parse(&buf).unwrap();
        assert_eq!(parsed, table);
        assert!(parsed.columns.is_empty());
    }

    #[test]
    fn name_budget_covers_the_varchar_header() {
        // 60 bytes of name + 4 bytes of length prefix fill the budget.
        let ok = TableDescriptor::new("t".repeat(60), Vec::new());
        let mut buf = vec![0u8; ok.encoded_len()];
        assert!(ok.encode_into(&mut buf).is_ok());

        let too_long = TableDescriptor::new("t".repeat(61), Vec::new());
        let mut buf = vec![0u8; too_long.encoded_len()];
        let err = too_long.encode_into(&mut buf).unwrap_err();
        assert!(err.to_string().contains("budget"));
    }

    #[test]
    fn metadata_round_trips_pages_count_and_tables() {
        let mut metadata = Metadata {
            pages_count: 7,
            tables: vec![users(), TableDescriptor::new("audit", Vec::new())],
        };
        metadata.tables[0].data_pages = vec![3, 4];

        let mut buf = vec![0u8; 512];
        metadata.encode_into(&mut buf).unwrap();

        let parsed = Metadata::parse(&buf).unwrap();
        assert_eq!(parsed.pages_count, 7);
        assert_eq!(parsed.tables, metadata.tables);
    }

    #[test]
    fn parse_rejects_oversized_names() {
        let mut buf = vec![0u8; 128];
        encoding::write_u8(&mut buf, ItemType::Integer as u8).unwrap();
        encoding::write_varchar(&mut buf[1..], "x".repeat(80).as_bytes()).unwrap();

        let err = ColumnDescriptor::parse(&buf).unwrap_err();
        assert!(err.to_string().contains("budget"));
    }
}
