//! Unsigned variable-length integers.
//!
//! Each byte carries 7 bits of the value, least significant group first.
//! The high bit is set on every byte except the last:
//!
//! ```text
//! 300 = 0b1_0010_1100
//!     -> 0xAC (0b1_0101100: low 7 bits, more follows)
//!        0x02 (0b0_0000010: remaining bits, last byte)
//! ```

use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Longest encoding of a `u64` (64 bits / 7 bits per byte, rounded up).
pub const MAX_LEN_U64: usize = 10;

/// Longest encoding accepted when decoding a signed 64-bit (63 usable bits) value.
pub const MAX_LEN_I64: usize = 9;

/// Longest encoding of a `u32`.
pub const MAX_LEN_U32: usize = 5;

/// Encode a value into a new buffer. Always produces at least one byte.
pub fn encode(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    encode_into(value, &mut buf);
    buf
}

/// Append the encoding of `value` to `buf`.
pub fn encode_into(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Encode a signed value. Negative values have no varint form.
pub fn encode_i64(value: i64) -> Result<Vec<u8>> {
    if value < 0 {
        return Err(Error::unsupported_value(format!(
            "varint cannot encode negative value {}",
            value
        )));
    }
    Ok(encode(value as u64))
}

/// Number of bytes `encode(value)` produces.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Write the encoding of `value`, returning the number of bytes written.
pub fn write<W: Write>(writer: &mut W, value: u64) -> Result<usize> {
    let buf = encode(value);
    writer.write_all(&buf)?;
    Ok(buf.len())
}

/// Decode a value from the start of `bytes`, returning it with the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut reader = bytes;
    let value = read_u64(&mut reader)?;
    Ok((value, bytes.len() - reader.len()))
}

/// Read a value of up to 64 bits.
pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    read_bounded(reader, MAX_LEN_U64, u64::MAX, 64)
}

/// Read a non-negative value that must fit an `i64`.
pub fn read_i64<R: Read>(reader: &mut R) -> Result<i64> {
    let value = read_bounded(reader, MAX_LEN_I64, i64::MAX as u64, 64)?;
    Ok(value as i64)
}

/// Read a value that must fit a `u32`.
pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let value = read_bounded(reader, MAX_LEN_U32, u32::MAX as u64, 32)?;
    Ok(value as u32)
}

/// Read a length or count.
pub fn read_usize<R: Read>(reader: &mut R) -> Result<usize> {
    let value = read_u64(reader)?;
    usize::try_from(value).map_err(|_| Error::overflow(usize::BITS))
}

fn read_bounded<R: Read>(reader: &mut R, max_len: usize, max_value: u64, bits: u32) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;

    for _ in 0..max_len {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).map_err(Error::from_read)?;
        let group = (byte[0] & 0x7F) as u64;

        // The final group of a u64 has room for a single bit.
        if shift == 63 && group > 1 {
            return Err(Error::overflow(bits));
        }
        value |= group << shift;

        if byte[0] & 0x80 == 0 {
            if value > max_value {
                return Err(Error::overflow(bits));
            }
            return Ok(value);
        }
        shift += 7;
    }

    Err(Error::overflow(bits))
}
