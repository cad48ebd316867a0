//! # Big-Endian Wire Codec
//!
//! Fixed-width integer and varchar encoding shared by every on-disk
//! structure in the engine. All multi-byte integers are big-endian.
//!
//! ## Conventions
//!
//! - Readers take a byte slice and return `(value, bytes_read)`.
//! - Writers take a mutable slice and return `bytes_written`.
//! - A slice that cannot hold the value is an error, never a panic or a
//!   partial write.
//!
//! ## Varchar Format
//!
//! ```text
//! +----------------+------------------+
//! | length: i32 BE | payload bytes    |
//! +----------------+------------------+
//! ```
//!
//! The length is encoded as a signed 32-bit integer but interpreted as
//! unsigned 31-bit: negative lengths are rejected on read and payloads
//! larger than `i32::MAX` are rejected on write. The payload is opaque;
//! no text encoding is imposed at this layer.
//!
//! ## Thread Safety
//!
//! All functions are pure and stateless.

use eyre::{ensure, Result};

/// Bytes occupied by the varchar length prefix.
pub const VARCHAR_HEADER_SIZE: usize = 4;

macro_rules! int_codec {
    ($read:ident, $write:ident, $ty:ty) => {
        pub fn $read(buf: &[u8]) -> Result<($ty, usize)> {
            const WIDTH: usize = size_of::<$ty>();
            ensure!(
                buf.len() >= WIDTH,
                "buffer too small for {}: {} < {}",
                stringify!($ty),
                buf.len(),
                WIDTH
            );
            let mut bytes = [0u8; WIDTH];
            bytes.copy_from_slice(&buf[..WIDTH]);
            Ok((<$ty>::from_be_bytes(bytes), WIDTH))
        }

        pub fn $write(buf: &mut [u8], value: $ty) -> Result<usize> {
            const WIDTH: usize = size_of::<$ty>();
            ensure!(
                buf.len() >= WIDTH,
                "buffer too small to write {}: {} < {}",
                stringify!($ty),
                buf.len(),
                WIDTH
            );
            buf[..WIDTH].copy_from_slice(&value.to_be_bytes());
            Ok(WIDTH)
        }
    };
}

int_codec!(read_u8, write_u8, u8);
int_codec!(read_u16, write_u16, u16);
int_codec!(read_u32, write_u32, u32);
int_codec!(read_u64, write_u64, u64);
int_codec!(read_i8, write_i8, i8);
int_codec!(read_i16, write_i16, i16);
int_codec!(read_i32, write_i32, i32);
int_codec!(read_i64, write_i64, i64);

/// Encoded size of `data` as a varchar.
pub fn varchar_len_of(data: &[u8]) -> usize {
    VARCHAR_HEADER_SIZE + data.len()
}

/// Total encoded size of the varchar sitting at the start of `buf`.
///
/// Only the length prefix is inspected; the payload may extend beyond the
/// slice the caller has in hand.
pub fn varchar_len_in(buf: &[u8]) -> Result<usize> {
    let (len, _) = read_i32(buf)?;
    ensure!(len >= 0, "negative varchar length: {}", len);
    Ok(VARCHAR_HEADER_SIZE + len as usize)
}

pub fn write_varchar(buf: &mut [u8], data: &[u8]) -> Result<usize> {
    ensure!(
        data.len() <= i32::MAX as usize,
        "varchar payload too large: {} bytes",
        data.len()
    );
    let total = VARCHAR_HEADER_SIZE + data.len();
    ensure!(
        buf.len() >= total,
        "buffer too small for varchar: {} < {}",
        buf.len(),
        total
    );
    write_i32(buf, data.len() as i32)?;
    buf[VARCHAR_HEADER_SIZE..total].copy_from_slice(data);
    Ok(total)
}

/// Reads the varchar at the start of `buf`, returning a zero-copy borrow of
/// the payload and the total bytes consumed.
pub fn read_varchar(buf: &[u8]) -> Result<(&[u8], usize)> {
    let (len, _) = read_i32(buf)?;
    ensure!(len >= 0, "negative varchar length: {}", len);
    let len = len as usize;
    let total = VARCHAR_HEADER_SIZE + len;
    ensure!(
        buf.len() >= total,
        "truncated varchar: need {} bytes, have {}",
        total,
        buf.len()
    );
    Ok((&buf[VARCHAR_HEADER_SIZE..total], total))
}
