//! A general Thrift-compact-protocol reader for open-ended structs:
//! field-id delta encoding, unknown-field skipping, and the handful of
//! scalar/collection types Parquet metadata uses. Unlike
//! [`vex_thrift`]'s fixed-shape kernels, this walks arbitrary structs
//! one field at a time, the way a generated Thrift deserializer would.

use vex_core::error::{Error, ErrorCode, Result};
use vex_core::wire::varint;
use vex_thrift::{header, zigzag};

/// Thrift compact-protocol type tags, as they appear in field and
/// collection-element headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactType {
    /// Struct end-of-fields marker (field headers only).
    Stop,
    /// Boolean field with value `true`, the value folded into the type
    /// nibble (field headers only).
    BooleanTrue,
    /// Boolean field with value `false` (field headers only).
    BooleanFalse,
    /// `byte` / `i8`.
    Byte,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `double`.
    Double,
    /// `binary` / `string`.
    Binary,
    /// `list`.
    List,
    /// `set`.
    Set,
    /// `map`.
    Map,
    /// `struct`.
    Struct,
}

impl CompactType {
    fn from_nibble(nibble: u8) -> Result<Self> {
        Ok(match nibble {
            0x0 => CompactType::Stop,
            0x1 => CompactType::BooleanTrue,
            0x2 => CompactType::BooleanFalse,
            0x3 => CompactType::Byte,
            0x4 => CompactType::I16,
            0x5 => CompactType::I32,
            0x6 => CompactType::I64,
            0x7 => CompactType::Double,
            0x8 => CompactType::Binary,
            0x9 => CompactType::List,
            0xA => CompactType::Set,
            0xB => CompactType::Map,
            0xC => CompactType::Struct,
            _ => return Err(Error::new(ErrorCode::NodeInvalidInput, "unknown thrift compact type nibble")),
        })
    }

    /// The nibble a collection header uses for this element type (same
    /// space as [`vex_thrift::header`]'s `TYPE_*` constants, except
    /// booleans collapse to a single id there too).
    fn collection_nibble(self) -> u8 {
        match self {
            CompactType::Stop => 0x0,
            CompactType::BooleanTrue | CompactType::BooleanFalse => 0x1,
            CompactType::Byte => 0x3,
            CompactType::I16 => 0x4,
            CompactType::I32 => 0x5,
            CompactType::I64 => 0x6,
            CompactType::Double => 0x7,
            CompactType::Binary => 0x8,
            CompactType::List => 0x9,
            CompactType::Set => 0xA,
            CompactType::Map => 0xB,
            CompactType::Struct => 0xC,
        }
    }
}

/// One struct field header, or the end-of-struct marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldHeader {
    /// No more fields in the enclosing struct.
    Stop,
    /// A present field: its type and id. For [`CompactType::BooleanTrue`]
    /// / [`CompactType::BooleanFalse`] the value is the type itself and
    /// no further bytes encode it.
    Field {
        /// The field's wire type.
        ty: CompactType,
        /// The field's declared id.
        id: i16,
    },
}

/// A cursor over a Thrift-compact-encoded byte slice, tracking the
/// struct-nesting stack needed for field-id delta decoding.
pub struct ThriftCompactReader<'a> {
    src: &'a [u8],
    pos: usize,
    last_field_id: Vec<i16>,
}

impl<'a> ThriftCompactReader<'a> {
    /// A reader over `src`, starting at its first byte.
    pub fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0, last_field_id: vec![0] }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Bytes remaining after the cursor.
    pub fn remaining(&self) -> usize {
        self.src.len() - self.pos
    }

    fn rest(&self) -> &'a [u8] {
        &self.src[self.pos..]
    }

    fn require(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::new(ErrorCode::SrcSizeTooSmall, "truncated thrift-compact value"));
        }
        Ok(())
    }

    /// Enter a new struct scope. Field-id deltas are relative to this
    /// scope until the matching [`Self::read_struct_end`].
    pub fn read_struct_begin(&mut self) -> Result<()> {
        self.last_field_id.push(0);
        Ok(())
    }

    /// Leave the current struct scope.
    pub fn read_struct_end(&mut self) -> Result<()> {
        self.last_field_id
            .pop()
            .ok_or_else(|| Error::new(ErrorCode::LogicError, "struct end with no matching begin"))?;
        Ok(())
    }

    /// Read the next field header (or `Stop`) in the current struct.
    pub fn read_field_begin(&mut self) -> Result<FieldHeader> {
        self.require(1)?;
        let byte = self.rest()[0];
        if byte == 0 {
            self.pos += 1;
            return Ok(FieldHeader::Stop);
        }
        let delta = byte >> 4;
        let ty = CompactType::from_nibble(byte & 0xF)?;
        self.pos += 1;

        let last = self
            .last_field_id
            .last_mut()
            .ok_or_else(|| Error::new(ErrorCode::LogicError, "field header outside any struct"))?;
        let id = if delta == 0 {
            let (raw, n) = varint::decode_strict(self.rest())?;
            self.pos += n;
            let raw: u32 = raw
                .try_into()
                .map_err(|_| Error::new(ErrorCode::Corruption, "field id varint exceeds 32 bits"))?;
            zigzag::decode_i32(raw) as i16
        } else {
            *last + delta as i16
        };
        *last = id;
        Ok(FieldHeader::Field { ty, id })
    }

    /// Read a zigzag-varint `i32` value.
    pub fn read_i32(&mut self) -> Result<i32> {
        let (v, n) = header::read_i32(self.rest())?;
        self.pos += n;
        Ok(v)
    }

    /// Read a zigzag-varint `i64` value.
    pub fn read_i64(&mut self) -> Result<i64> {
        let (v, n) = header::read_i64(self.rest())?;
        self.pos += n;
        Ok(v)
    }

    /// Read a length-prefixed (plain unsigned varint, not zigzag) UTF-8
    /// string.
    pub fn read_string(&mut self) -> Result<String> {
        let (len, n) = varint::decode_strict(self.rest())?;
        self.pos += n;
        let len = len as usize;
        self.require(len)?;
        let bytes = &self.rest()[..len];
        self.pos += len;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::new(ErrorCode::NodeInvalidInput, "field contains non-UTF-8 string bytes"))
    }

    /// Read a list (or set) header. Returns `(element_type, size)`.
    pub fn read_list_begin(&mut self) -> Result<(CompactType, usize)> {
        let (list, n) = header::read_list_header(self.rest(), None)?;
        self.pos += n;
        Ok((CompactType::from_nibble(list.element_type)?, list.size))
    }

    /// Read a map header. Returns `(key_type, value_type, size)`.
    pub fn read_map_begin(&mut self) -> Result<(CompactType, CompactType, usize)> {
        let (map, n) = header::read_map_header(self.rest(), None, None)?;
        self.pos += n;
        let key_type = if map.size > 0 { CompactType::from_nibble(map.key_type)? } else { CompactType::Stop };
        let value_type = if map.size > 0 { CompactType::from_nibble(map.value_type)? } else { CompactType::Stop };
        Ok((key_type, value_type, map.size))
    }

    /// Skip one value of the given type, recursing through nested
    /// structs/collections. Used for fields the caller doesn't care
    /// about.
    pub fn skip(&mut self, ty: CompactType) -> Result<()> {
        match ty {
            CompactType::Stop => Ok(()),
            CompactType::BooleanTrue | CompactType::BooleanFalse => Ok(()),
            CompactType::Byte => {
                self.require(1)?;
                self.pos += 1;
                Ok(())
            }
            CompactType::I16 | CompactType::I32 | CompactType::I64 => {
                let (_, n) = varint::decode_strict(self.rest())?;
                self.pos += n;
                Ok(())
            }
            CompactType::Double => {
                self.require(8)?;
                self.pos += 8;
                Ok(())
            }
            CompactType::Binary => {
                self.read_string().map(|_| ())
            }
            CompactType::List | CompactType::Set => {
                let (elem_ty, size) = self.read_list_begin()?;
                for _ in 0..size {
                    self.skip(elem_ty)?;
                }
                Ok(())
            }
            CompactType::Map => {
                let (key_ty, value_ty, size) = self.read_map_begin()?;
                for _ in 0..size {
                    self.skip(key_ty)?;
                    self.skip(value_ty)?;
                }
                Ok(())
            }
            CompactType::Struct => {
                self.read_struct_begin()?;
                loop {
                    match self.read_field_begin()? {
                        FieldHeader::Stop => break,
                        FieldHeader::Field { ty, .. } => self.skip(ty)?,
                    }
                }
                self.read_struct_end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_header(delta: u8, ty: CompactType) -> u8 {
        (delta << 4) | ty.collection_nibble()
    }

    #[test]
    fn reads_delta_encoded_field_ids_in_order() {
        let mut buf = Vec::new();
        buf.push(field_header(1, CompactType::I32)); // field 1
        header::write_i32(42, &mut buf);
        buf.push(field_header(2, CompactType::I32)); // field 3
        header::write_i32(-7, &mut buf);
        buf.push(0); // stop

        let mut reader = ThriftCompactReader::new(&buf);
        reader.read_struct_begin().unwrap();
        assert_eq!(reader.read_field_begin().unwrap(), FieldHeader::Field { ty: CompactType::I32, id: 1 });
        assert_eq!(reader.read_i32().unwrap(), 42);
        assert_eq!(reader.read_field_begin().unwrap(), FieldHeader::Field { ty: CompactType::I32, id: 3 });
        assert_eq!(reader.read_i32().unwrap(), -7);
        assert_eq!(reader.read_field_begin().unwrap(), FieldHeader::Stop);
        reader.read_struct_end().unwrap();
        assert_eq!(reader.consumed(), buf.len());
    }

    #[test]
    fn skips_unknown_struct_field() {
        let mut buf = Vec::new();
        buf.push(field_header(5, CompactType::Binary));
        varint::encode(3, &mut buf);
        buf.extend_from_slice(b"abc");
        buf.push(field_header(1, CompactType::I32));
        header::write_i32(9, &mut buf);
        buf.push(0);

        let mut reader = ThriftCompactReader::new(&buf);
        reader.read_struct_begin().unwrap();
        match reader.read_field_begin().unwrap() {
            FieldHeader::Field { ty, id } => {
                assert_eq!(id, 5);
                reader.skip(ty).unwrap();
            }
            FieldHeader::Stop => panic!("expected a field"),
        }
        match reader.read_field_begin().unwrap() {
            FieldHeader::Field { ty: CompactType::I32, id: 6 } => {}
            other => panic!("unexpected header {other:?}"),
        }
        assert_eq!(reader.read_i32().unwrap(), 9);
        assert_eq!(reader.read_field_begin().unwrap(), FieldHeader::Stop);
    }

    #[test]
    fn reads_list_of_strings() {
        let mut buf = Vec::new();
        header::write_list_header(CompactType::Binary.collection_nibble(), 2, &mut buf);
        varint::encode(3, &mut buf);
        buf.extend_from_slice(b"foo");
        varint::encode(3, &mut buf);
        buf.extend_from_slice(b"bar");

        let mut reader = ThriftCompactReader::new(&buf);
        let (ty, size) = reader.read_list_begin().unwrap();
        assert_eq!(ty, CompactType::Binary);
        assert_eq!(size, 2);
        assert_eq!(reader.read_string().unwrap(), "foo");
        assert_eq!(reader.read_string().unwrap(), "bar");
        assert_eq!(reader.consumed(), buf.len());
    }
}
