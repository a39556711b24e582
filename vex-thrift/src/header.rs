//! Thrift-compact protocol primitives: the collection element type
//! nibbles, varint-plus-zigzag integers, and map/list header framing.

use vex_core::error::{Error, ErrorCode, Result};
use vex_core::wire::varint;

use crate::zigzag;

/// Compact-protocol element type id for `bool` (collapsed true/false).
pub const TYPE_BOOL: u8 = 0x1;
/// Element type id for `byte`.
pub const TYPE_BYTE: u8 = 0x3;
/// Element type id for `i16`.
pub const TYPE_I16: u8 = 0x4;
/// Element type id for `i32`.
pub const TYPE_I32: u8 = 0x5;
/// Element type id for `i64`.
pub const TYPE_I64: u8 = 0x6;
/// Element type id for `double`.
pub const TYPE_DOUBLE: u8 = 0x7;
/// Element type id for `binary`/`string`.
pub const TYPE_BINARY: u8 = 0x8;
/// Element type id for `list`.
pub const TYPE_LIST: u8 = 0x9;
/// Element type id for `set`.
pub const TYPE_SET: u8 = 0xA;
/// Element type id for `map`.
pub const TYPE_MAP: u8 = 0xB;
/// Element type id for `struct`.
pub const TYPE_STRUCT: u8 = 0xC;
/// Non-standard extension: a packed big-endian 4-byte `float`. Thrift has
/// no native single-precision type; this tag marks values this crate's
/// callers have agreed to store that way.
pub const TYPE_FLOAT32: u8 = 0xD;

/// A collection size of 15 or more is never packed into the header
/// nibble; `0xF` there means "read a following varint for the real size".
const LONG_FORM_SENTINEL: u8 = 0xF;

/// Read a zigzag-varint-encoded `i32` from the front of `input`.
/// Returns `(value, bytes_consumed)`.
pub fn read_i32(input: &[u8]) -> Result<(i32, usize)> {
    let (raw, n) = varint::decode_strict(input)?;
    let raw: u32 = raw
        .try_into()
        .map_err(|_| Error::new(ErrorCode::Corruption, "i32 varint exceeds 32 bits"))?;
    Ok((zigzag::decode_i32(raw), n))
}

/// Write a zigzag-varint-encoded `i32`.
pub fn write_i32(value: i32, out: &mut Vec<u8>) {
    varint::encode(zigzag::encode_i32(value) as u64, out);
}

/// Read a zigzag-varint-encoded `i64` from the front of `input`.
/// Returns `(value, bytes_consumed)`.
pub fn read_i64(input: &[u8]) -> Result<(i64, usize)> {
    let (raw, n) = varint::decode_strict(input)?;
    Ok((zigzag::decode_i64(raw), n))
}

/// Write a zigzag-varint-encoded `i64`.
pub fn write_i64(value: i64, out: &mut Vec<u8>) {
    varint::encode(zigzag::encode_i64(value), out);
}

/// A decoded map header: element count plus (key, value) type nibbles.
/// The type fields are `0` (absent) when `size` is `0`, since the
/// compact protocol omits the type byte entirely for an empty map.
#[derive(Debug, Clone, Copy)]
pub struct MapHeader {
    /// Number of key/value pairs.
    pub size: usize,
    /// Key element type nibble (0 if `size == 0`).
    pub key_type: u8,
    /// Value element type nibble (0 if `size == 0`).
    pub value_type: u8,
}

/// Read a map header, checking the key/value types against
/// `expected_key_type`/`expected_value_type` when `size > 0` and those
/// are `Some`. Returns `(header, bytes_consumed)`.
pub fn read_map_header(
    input: &[u8],
    expected_key_type: Option<u8>,
    expected_value_type: Option<u8>,
) -> Result<(MapHeader, usize)> {
    let (size, mut consumed) = varint::decode_strict(input)?;
    let size = size as usize;
    let (key_type, value_type) = if size > 0 {
        let byte = *input
            .get(consumed)
            .ok_or_else(|| Error::new(ErrorCode::SrcSizeTooSmall, "truncated map header type byte"))?;
        consumed += 1;
        let key_type = byte >> 4;
        let value_type = byte & 0xF;
        if let Some(expected) = expected_key_type {
            if key_type != expected {
                return Err(Error::new(ErrorCode::NodeInvalidInput, "map key type mismatch"));
            }
        }
        if let Some(expected) = expected_value_type {
            if value_type != expected {
                return Err(Error::new(ErrorCode::NodeInvalidInput, "map value type mismatch"));
            }
        }
        (key_type, value_type)
    } else {
        (0, 0)
    };
    Ok((MapHeader { size, key_type, value_type }, consumed))
}

/// Write a map header for `size` entries of `(key_type, value_type)`.
pub fn write_map_header(key_type: u8, value_type: u8, size: usize, out: &mut Vec<u8>) {
    varint::encode(size as u64, out);
    if size > 0 {
        out.push((key_type << 4) | value_type);
    }
}

/// A decoded list (or set) header: element count plus element type.
#[derive(Debug, Clone, Copy)]
pub struct ListHeader {
    /// Number of elements.
    pub size: usize,
    /// Element type nibble.
    pub element_type: u8,
}

/// Read a list/set header, checking the element type against
/// `expected_type` when `Some`. Returns `(header, bytes_consumed)`.
pub fn read_list_header(input: &[u8], expected_type: Option<u8>) -> Result<(ListHeader, usize)> {
    let byte = *input
        .first()
        .ok_or_else(|| Error::new(ErrorCode::SrcSizeTooSmall, "truncated list header"))?;
    let element_type = byte & 0xF;
    if let Some(expected) = expected_type {
        if element_type != expected {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "list element type mismatch"));
        }
    }
    let nibble_size = byte >> 4;
    let mut consumed = 1;
    let size = if nibble_size == LONG_FORM_SENTINEL {
        let (size, n) = varint::decode_strict(&input[consumed..])?;
        consumed += n;
        if size < 15 {
            return Err(Error::new(
                ErrorCode::NodeInvalidInput,
                "long-form list size must be >= 15, a short-form encoding was available",
            ));
        }
        size as usize
    } else {
        nibble_size as usize
    };
    Ok((ListHeader { size, element_type }, consumed))
}

/// Write a list/set header for `size` elements of `element_type`.
pub fn write_list_header(element_type: u8, size: usize, out: &mut Vec<u8>) {
    let nibble = if size >= LONG_FORM_SENTINEL as usize { LONG_FORM_SENTINEL } else { size as u8 };
    out.push((nibble << 4) | element_type);
    if size >= LONG_FORM_SENTINEL as usize {
        varint::encode(size as u64, out);
    }
}
