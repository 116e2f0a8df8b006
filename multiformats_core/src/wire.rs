//! Tagged-field framing shared by the DAG and multiaddress codecs.
//!
//! A field is introduced by a varint key `(field_number << 3) | wire_type`.
//! Only the two wire types used by DAG nodes are understood:
//!
//! ```text
//! 0  varint            key, varint
//! 2  length-delimited  key, varint(len), len bytes
//! ```

use crate::error::{Error, Result};
use crate::varint;
use std::io::Read;

/// Wire type of a tagged field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireType {
    Varint = 0,
    LengthDelimited = 2,
}

impl WireType {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            2 => Ok(WireType::LengthDelimited),
            _ => Err(Error::invalid_data(format!("Unsupported wire type: {}", value))),
        }
    }
}

/// Append a field key.
pub(crate) fn write_tag(buf: &mut Vec<u8>, field: u32, wire_type: WireType) {
    varint::encode_into(((field as u64) << 3) | wire_type as u64, buf);
}

/// Read the next field key, or `None` when the input is exhausted.
pub(crate) fn read_tag(reader: &mut &[u8]) -> Result<Option<(u32, WireType)>> {
    if reader.is_empty() {
        return Ok(None);
    }
    let key = varint::read_u32(reader)?;
    let wire_type = WireType::from_u8((key & 0x07) as u8)?;
    Ok(Some((key >> 3, wire_type)))
}

/// Append a length-prefixed byte string.
pub(crate) fn write_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    varint::encode_into(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

/// Append a length-delimited field.
pub(crate) fn write_bytes_field(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    write_tag(buf, field, WireType::LengthDelimited);
    write_length_prefixed(buf, bytes);
}

/// Append a varint field.
pub(crate) fn write_varint_field(buf: &mut Vec<u8>, field: u32, value: u64) {
    write_tag(buf, field, WireType::Varint);
    varint::encode_into(value, buf);
}

/// Read a length-prefixed byte string from a slice without copying.
pub(crate) fn read_length_prefixed<'a>(reader: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = varint::read_usize(reader)?;
    let remaining: &'a [u8] = *reader;
    if len > remaining.len() {
        return Err(Error::EndOfInput);
    }
    let (bytes, rest) = remaining.split_at(len);
    *reader = rest;
    Ok(bytes)
}

/// Read a length-prefixed byte string from a stream.
///
/// The declared length is not trusted for allocation; the payload is read
/// incrementally and a short read is reported as end of input.
pub(crate) fn read_length_prefixed_from<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = varint::read_usize(reader)?;
    read_exactly(reader, len)
}

/// Read exactly `len` bytes from a stream.
pub(crate) fn read_exactly<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take(len as u64)
        .read_to_end(&mut bytes)
        .map_err(Error::from_read)?;
    if bytes.len() != len {
        return Err(Error::EndOfInput);
    }
    Ok(bytes)
}

/// Require that a field has the expected wire type.
pub(crate) fn expect_wire_type(field: u32, actual: WireType, expected: WireType) -> Result<()> {
    if actual != expected {
        return Err(Error::invalid_data(format!(
            "Field {} has wire type {:?}, expected {:?}",
            field, actual, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_tag_encoding() {
        let mut buf = Vec::new();
        write_tag(&mut buf, 1, WireType::LengthDelimited);
        write_tag(&mut buf, 2, WireType::LengthDelimited);
        write_tag(&mut buf, 3, WireType::Varint);
        assert_eq!(buf, vec![0x0A, 0x12, 0x18]);

        let mut reader = buf.as_slice();
        assert_eq!(
            read_tag(&mut reader).unwrap(),
            Some((1, WireType::LengthDelimited))
        );
        assert_eq!(
            read_tag(&mut reader).unwrap(),
            Some((2, WireType::LengthDelimited))
        );
        assert_eq!(read_tag(&mut reader).unwrap(), Some((3, WireType::Varint)));
        assert_eq!(read_tag(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_unsupported_wire_type() {
        // field 1, wire type 5 (fixed32)
        let buf = [0x0D];
        let err = read_tag(&mut &buf[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_length_prefixed_slice() {
        let mut buf = Vec::new();
        write_length_prefixed(&mut buf, b"abc");
        buf.push(0xFF);

        let mut reader = buf.as_slice();
        assert_eq!(read_length_prefixed(&mut reader).unwrap(), b"abc");
        assert_eq!(reader, &[0xFF]);
    }

    #[test]
    fn test_length_prefixed_truncated() {
        let buf = [0x05, b'a', b'b'];
        let err = read_length_prefixed(&mut &buf[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndOfInput);

        let err = read_length_prefixed_from(&mut &buf[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndOfInput);
    }

    #[test]
    fn test_huge_declared_length_does_not_allocate() {
        let mut buf = varint::encode(u32::MAX as u64);
        buf.extend_from_slice(b"tiny");
        let err = read_length_prefixed_from(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndOfInput);
    }
}
