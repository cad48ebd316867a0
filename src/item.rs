//! # Typed Row Items
//!
//! A row is a sequence of items serialized back-to-back in column order.
//! Three primitive item types exist; the serialization is dictated entirely
//! by the type, so no per-item tag is stored in the row payload. The schema
//! (held by the metadata catalog) supplies the types on read.
//!
//! | Type    | Wire format                    |
//! |---------|--------------------------------|
//! | Integer | 8 bytes, i64 big-endian        |
//! | String  | varchar (4-byte length prefix) |
//! | Bytes   | varchar (4-byte length prefix) |
//!
//! ## Views
//!
//! [`ItemView`] pairs a borrowed byte range with its item type and defers
//! decoding until an accessor is called. Accessors validate the view's type
//! tag against the requested type; a mismatch is an error, not a coercion.
//! String accessors additionally impose UTF-8; the wire format itself is
//! opaque bytes, and callers with non-UTF-8 payloads should use `Bytes`.

use eyre::{bail, ensure, Result};

use crate::encoding;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Integer = 1,
    String = 2,
    Bytes = 3,
}

impl ItemType {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(ItemType::Integer),
            2 => Ok(ItemType::String),
            3 => Ok(ItemType::Bytes),
            _ => bail!("unknown item type tag: {:#04x}", b),
        }
    }

    /// Size in bytes this item type occupies at the start of `buf`.
    ///
    /// Fixed for integers; read from the varchar length prefix for the
    /// variable types.
    pub fn len_in(&self, buf: &[u8]) -> Result<usize> {
        match self {
            ItemType::Integer => Ok(8),
            ItemType::String | ItemType::Bytes => encoding::varchar_len_in(buf),
        }
    }
}

/// An owned item value. One variant per primitive type; the variant carries
/// its payload directly so nonsensical combinations are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Integer(i64),
    String(String),
    Bytes(Vec<u8>),
}

impl Item {
    pub fn item_type(&self) -> ItemType {
        match self {
            Item::Integer(_) => ItemType::Integer,
            Item::String(_) => ItemType::String,
            Item::Bytes(_) => ItemType::Bytes,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Item::Integer(_) => 8,
            Item::String(s) => encoding::varchar_len_of(s.as_bytes()),
            Item::Bytes(b) => encoding::varchar_len_of(b),
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Item::Integer(v) => encoding::write_i64(buf, *v),
            Item::String(s) => encoding::write_varchar(buf, s.as_bytes()),
            Item::Bytes(b) => encoding::write_varchar(buf, b),
        }
    }
}

impl From<i64> for Item {
    fn from(v: i64) -> Self {
        Item::Integer(v)
    }
}

impl From<&str> for Item {
    fn from(v: &str) -> Self {
        Item::String(v.to_string())
    }
}

impl From<String> for Item {
    fn from(v: String) -> Self {
        Item::String(v)
    }
}

impl From<Vec<u8>> for Item {
    fn from(v: Vec<u8>) -> Self {
        Item::Bytes(v)
    }
}

/// Total serialized size of `items` laid out back-to-back.
pub fn items_len(items: &[Item]) -> usize {
    items.iter().map(Item::encoded_len).sum()
}

/// Serializes `items` into `buf` in order, returning the bytes written.
pub fn encode_items(items: &[Item], buf: &mut [u8]) -> Result<usize> {
    let mut offset = 0;
    for (idx, item) in items.iter().enumerate() {
        let written = item
            .encode_into(&mut buf[offset..])
            .map_err(|e| eyre::eyre!("failed to serialize item {}: {}", idx, e))?;
        offset += written;
    }
    Ok(offset)
}

/// A zero-copy view over one serialized item.
#[derive(Debug, Clone, Copy)]
pub struct ItemView<'a> {
    data: &'a [u8],
    item_type: ItemType,
}

impl<'a> ItemView<'a> {
    pub fn new(data: &'a [u8], item_type: ItemType) -> Self {
        Self { data, item_type }
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    /// Raw serialized bytes of this item.
    pub fn raw(&self) -> &'a [u8] {
        self.data
    }

    fn ensure_type(&self, want: ItemType) -> Result<()> {
        ensure!(
            self.item_type == want,
            "item type mismatch: want {:?}, view holds {:?}",
            want,
            self.item_type
        );
        Ok(())
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.ensure_type(ItemType::Integer)?;
        let (value, _) = encoding::read_i64(self.data)?;
        Ok(value)
    }

    pub fn as_str(&self) -> Result<&'a str> {
        self.ensure_type(ItemType::String)?;
        let (payload, _) = encoding::read_varchar(self.data)?;
        std::str::from_utf8(payload).map_err(|e| eyre::eyre!("invalid UTF-8 in string item: {}", e))
    }

    pub fn as_bytes(&self) -> Result<&'a [u8]> {
        self.ensure_type(ItemType::Bytes)?;
        let (payload, _) = encoding::read_varchar(self.data)?;
        Ok(payload)
    }

    /// Decodes the view into an owned [`Item`].
    pub fn to_item(&self) -> Result<Item> {
        match self.item_type {
            ItemType::Integer => self.as_i64().map(Item::Integer),
            ItemType::String => self.as_str().map(|s| Item::String(s.to_string())),
            ItemType::Bytes => self.as_bytes().map(|b| Item::Bytes(b.to_vec())),
        }
    }
}
