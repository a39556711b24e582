//! Parsed Parquet file/page metadata (`spec.md` §4.I), read from the
//! Thrift-compact `FileMetaData` and `PageHeader` structs via
//! [`crate::thrift_reader`].

use std::collections::HashMap;

use vex_core::error::{Error, ErrorCode, Result};

use crate::thrift_reader::{CompactType, FieldHeader, ThriftCompactReader};

/// A column's physical Parquet storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 1-bit boolean.
    Boolean,
    /// 4-byte signed integer.
    Int32,
    /// 8-byte signed integer.
    Int64,
    /// 4-byte IEEE float.
    Float,
    /// 8-byte IEEE double.
    Double,
    /// Variable-length byte string.
    ByteArray,
    /// Fixed-width byte string.
    FixedLenByteArray,
}

impl DataType {
    fn from_thrift(value: i32) -> Result<Self> {
        Ok(match value {
            0 => DataType::Boolean,
            1 => DataType::Int32,
            2 => DataType::Int64,
            4 => DataType::Float,
            5 => DataType::Double,
            6 => DataType::ByteArray,
            7 => DataType::FixedLenByteArray,
            _ => return Err(Error::new(ErrorCode::NodeInvalidInput, "unknown parquet data type")),
        })
    }
}

/// A schema path: the sequence of field names from the root to a leaf.
pub type SchemaPath = Vec<String>;

/// Leaf-level schema metadata, keyed by [`SchemaPath`].
#[derive(Debug, Clone, Copy)]
pub struct SchemaLeaf {
    /// The leaf's physical type.
    pub data_type: DataType,
    /// For `FixedLenByteArray` leaves, the fixed width; otherwise unused.
    pub type_width: u32,
}

/// One column chunk's metadata, as recorded in a row group.
#[derive(Debug, Clone)]
pub struct ColumnChunkMetadata {
    /// The column's physical type.
    pub data_type: DataType,
    /// Total uncompressed byte count across all of this chunk's pages.
    pub num_bytes: i64,
    /// The column's schema path.
    pub path_in_schema: SchemaPath,
}

/// The parsed Parquet `FileMetaData` struct.
#[derive(Debug, Clone, Default)]
pub struct FileMetadata {
    /// Total row count across all row groups.
    pub num_rows: u64,
    /// Column count per row group.
    pub num_columns: u32,
    /// Row group count.
    pub num_row_groups: u32,
    /// Column chunks, in `(row_group, column)` order.
    pub column_chunks: Vec<ColumnChunkMetadata>,
    /// Leaf schema metadata, by path.
    pub schema: HashMap<SchemaPath, SchemaLeaf>,
}

/// A Parquet page's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// A data page (values for a column chunk).
    DataPage,
    /// A column index page.
    IndexPage,
    /// A dictionary page.
    DictionaryPage,
    /// A version-2 data page.
    DataPageV2,
}

impl PageType {
    fn from_thrift(value: i32) -> Result<Self> {
        Ok(match value {
            0 => PageType::DataPage,
            1 => PageType::IndexPage,
            2 => PageType::DictionaryPage,
            3 => PageType::DataPageV2,
            _ => return Err(Error::new(ErrorCode::NodeInvalidInput, "unknown parquet page type")),
        })
    }
}

/// A value or level encoding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Raw fixed-width or length-prefixed values, no further decoding.
    Plain,
    /// Dictionary-index-referencing encoding.
    PlainDictionary,
    /// Run-length/bit-packing hybrid.
    Rle,
    /// Pure bit-packing.
    BitPacked,
    /// Delta-encoded binary-packed integers.
    DeltaBinaryPacked,
    /// Delta-encoded byte-array lengths.
    DeltaLengthByteArray,
    /// Delta-encoded byte arrays.
    DeltaByteArray,
    /// Dictionary indices, RLE-encoded.
    RleDictionary,
    /// Byte-stream-split encoding.
    ByteStreamSplit,
}

impl Encoding {
    fn from_thrift(value: i32) -> Result<Self> {
        Ok(match value {
            0 => Encoding::Plain,
            2 => Encoding::PlainDictionary,
            3 => Encoding::Rle,
            4 => Encoding::BitPacked,
            5 => Encoding::DeltaBinaryPacked,
            6 => Encoding::DeltaLengthByteArray,
            7 => Encoding::DeltaByteArray,
            8 => Encoding::RleDictionary,
            9 => Encoding::ByteStreamSplit,
            _ => return Err(Error::new(ErrorCode::NodeInvalidInput, "unknown parquet encoding")),
        })
    }
}

/// A decoded Parquet page header.
#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    /// The page's kind.
    pub page_type: PageType,
    /// Uncompressed size of the page body (levels + values), in bytes.
    pub num_bytes: i32,
    /// Value encoding (data pages only).
    pub encoding: Encoding,
    /// Definition-level encoding (data pages only).
    pub dl_encoding: Encoding,
    /// Repetition-level encoding (data pages only).
    pub rl_encoding: Encoding,
}

impl Default for PageHeader {
    fn default() -> Self {
        Self {
            page_type: PageType::DataPage,
            num_bytes: 0,
            encoding: Encoding::Plain,
            dl_encoding: Encoding::Rle,
            rl_encoding: Encoding::Rle,
        }
    }
}

fn expect_type(actual: CompactType, expected: CompactType) -> Result<()> {
    if actual != expected {
        return Err(Error::new(ErrorCode::NodeInvalidInput, "unexpected thrift field type"));
    }
    Ok(())
}

fn read_column_chunk_metadata(reader: &mut ThriftCompactReader, metadata: &mut ColumnChunkMetadata) -> Result<()> {
    reader.read_struct_begin()?;
    loop {
        match reader.read_field_begin()? {
            FieldHeader::Stop => break,
            FieldHeader::Field { ty, id } => match id {
                1 => {
                    expect_type(ty, CompactType::I32)?;
                    metadata.data_type = DataType::from_thrift(reader.read_i32()?)?;
                }
                3 => {
                    expect_type(ty, CompactType::List)?;
                    let (elem_ty, size) = reader.read_list_begin()?;
                    expect_type(elem_ty, CompactType::Binary)?;
                    if size > reader.remaining() {
                        return Err(Error::new(ErrorCode::NodeInvalidInput, "path_in_schema claims too many entries"));
                    }
                    metadata.path_in_schema = Vec::with_capacity(size);
                    for _ in 0..size {
                        metadata.path_in_schema.push(reader.read_string()?);
                    }
                }
                4 => {
                    expect_type(ty, CompactType::I32)?;
                    let codec = reader.read_i32()?;
                    if codec != 0 {
                        return Err(Error::new(ErrorCode::NodeInvalidInput, "compressed column chunks are not supported"));
                    }
                }
                6 => {
                    expect_type(ty, CompactType::I64)?;
                    metadata.num_bytes = reader.read_i64()?;
                }
                _ => reader.skip(ty)?,
            },
        }
    }
    reader.read_struct_end()
}

fn read_column_chunk(reader: &mut ThriftCompactReader, metadata: &mut ColumnChunkMetadata) -> Result<()> {
    reader.read_struct_begin()?;
    loop {
        match reader.read_field_begin()? {
            FieldHeader::Stop => break,
            FieldHeader::Field { ty, id } => match id {
                3 => {
                    expect_type(ty, CompactType::Struct)?;
                    read_column_chunk_metadata(reader, metadata)?;
                }
                _ => reader.skip(ty)?,
            },
        }
    }
    reader.read_struct_end()
}

fn read_row_group(reader: &mut ThriftCompactReader, metadata: &mut FileMetadata, row: u32) -> Result<()> {
    reader.read_struct_begin()?;
    loop {
        match reader.read_field_begin()? {
            FieldHeader::Stop => break,
            FieldHeader::Field { ty, id } => match id {
                1 => {
                    expect_type(ty, CompactType::List)?;
                    let (elem_ty, size) = reader.read_list_begin()?;
                    expect_type(elem_ty, CompactType::Struct)?;
                    metadata.num_columns = size as u32;
                    if row == 0 {
                        let total = metadata.num_columns as usize * metadata.num_row_groups as usize;
                        if total > reader.remaining() {
                            return Err(Error::new(ErrorCode::NodeInvalidInput, "column chunk count claims too much data"));
                        }
                        metadata.column_chunks = vec![
                            ColumnChunkMetadata {
                                data_type: DataType::Boolean,
                                num_bytes: 0,
                                path_in_schema: Vec::new(),
                            };
                            total
                        ];
                    }
                    for i in 0..metadata.num_columns as usize {
                        let idx = row as usize * metadata.num_columns as usize + i;
                        let chunk = metadata
                            .column_chunks
                            .get_mut(idx)
                            .ok_or_else(|| Error::new(ErrorCode::LogicError, "column chunk index out of range"))?;
                        read_column_chunk(reader, chunk)?;
                    }
                }
                _ => reader.skip(ty)?,
            },
        }
    }
    reader.read_struct_end()
}

struct SchemaElement {
    name: String,
    is_leaf: bool,
    data_type: DataType,
    type_width: i32,
    num_children: i32,
}

impl Default for SchemaElement {
    fn default() -> Self {
        Self { name: String::new(), is_leaf: false, data_type: DataType::Boolean, type_width: 0, num_children: 0 }
    }
}

fn read_schema_element(reader: &mut ThriftCompactReader) -> Result<SchemaElement> {
    let mut e = SchemaElement::default();
    reader.read_struct_begin()?;
    loop {
        match reader.read_field_begin()? {
            FieldHeader::Stop => break,
            FieldHeader::Field { ty, id } => match id {
                1 => {
                    expect_type(ty, CompactType::I32)?;
                    e.data_type = DataType::from_thrift(reader.read_i32()?)?;
                    e.is_leaf = true;
                }
                2 => {
                    expect_type(ty, CompactType::I32)?;
                    e.type_width = reader.read_i32()?;
                }
                4 => {
                    expect_type(ty, CompactType::Binary)?;
                    e.name = reader.read_string()?;
                }
                5 => {
                    expect_type(ty, CompactType::I32)?;
                    e.num_children = reader.read_i32()?;
                }
                _ => reader.skip(ty)?,
            },
        }
    }
    reader.read_struct_end()?;
    Ok(e)
}

/// Flattens the preorder schema-element list into per-leaf-path metadata,
/// the way the original's explicit parent-stack walk does.
fn populate_schema(elements: Vec<SchemaElement>, schema: &mut HashMap<SchemaPath, SchemaLeaf>) -> Result<()> {
    let mut elements = elements;
    if elements.is_empty() {
        return Ok(());
    }
    let root = elements.remove(0);
    let mut stack: Vec<(i32, SchemaPath)> = vec![(root.num_children, SchemaPath::new())];

    for e in elements {
        let (num_children, parent_path) = stack
            .last_mut()
            .ok_or_else(|| Error::new(ErrorCode::NodeInvalidInput, "schema element has no enclosing group"))?;
        let mut path = parent_path.clone();
        path.push(e.name.clone());
        *num_children -= 1;
        let exhausted = *num_children == 0;
        if exhausted {
            stack.pop();
        }

        if !e.is_leaf {
            stack.push((e.num_children, path));
            continue;
        }

        let leaf = SchemaLeaf { data_type: e.data_type, type_width: e.type_width.max(0) as u32 };
        if schema.insert(path, leaf).is_some() {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "duplicate schema path"));
        }
    }
    Ok(())
}

/// Parse a Thrift-compact `FileMetaData` struct from the front of `reader`.
pub fn read_file_metadata(reader: &mut ThriftCompactReader) -> Result<FileMetadata> {
    let mut metadata = FileMetadata::default();
    reader.read_struct_begin()?;
    loop {
        match reader.read_field_begin()? {
            FieldHeader::Stop => break,
            FieldHeader::Field { ty, id } => match id {
                2 => {
                    expect_type(ty, CompactType::List)?;
                    let (elem_ty, size) = reader.read_list_begin()?;
                    expect_type(elem_ty, CompactType::Struct)?;
                    if size > reader.remaining() {
                        return Err(Error::new(ErrorCode::NodeInvalidInput, "schema element count claims too much data"));
                    }
                    let mut elements = Vec::with_capacity(size);
                    for _ in 0..size {
                        elements.push(read_schema_element(reader)?);
                    }
                    populate_schema(elements, &mut metadata.schema)?;
                }
                3 => {
                    expect_type(ty, CompactType::I64)?;
                    metadata.num_rows = reader.read_i64()? as u64;
                }
                4 => {
                    expect_type(ty, CompactType::List)?;
                    let (elem_ty, size) = reader.read_list_begin()?;
                    expect_type(elem_ty, CompactType::Struct)?;
                    metadata.num_row_groups = size as u32;
                    for row in 0..metadata.num_row_groups {
                        read_row_group(reader, &mut metadata, row)?;
                    }
                }
                _ => reader.skip(ty)?,
            },
        }
    }
    reader.read_struct_end()?;
    Ok(metadata)
}

fn read_data_page_header(reader: &mut ThriftCompactReader, header: &mut PageHeader) -> Result<()> {
    reader.read_struct_begin()?;
    loop {
        match reader.read_field_begin()? {
            FieldHeader::Stop => break,
            FieldHeader::Field { ty, id } => match id {
                2 => {
                    expect_type(ty, CompactType::I32)?;
                    header.encoding = Encoding::from_thrift(reader.read_i32()?)?;
                }
                3 => {
                    expect_type(ty, CompactType::I32)?;
                    header.dl_encoding = Encoding::from_thrift(reader.read_i32()?)?;
                }
                4 => {
                    expect_type(ty, CompactType::I32)?;
                    header.rl_encoding = Encoding::from_thrift(reader.read_i32()?)?;
                }
                _ => reader.skip(ty)?,
            },
        }
    }
    reader.read_struct_end()
}

/// Parse a Thrift-compact Parquet `PageHeader` struct.
pub fn read_page_header(reader: &mut ThriftCompactReader) -> Result<PageHeader> {
    let mut header = PageHeader::default();
    reader.read_struct_begin()?;
    loop {
        match reader.read_field_begin()? {
            FieldHeader::Stop => break,
            FieldHeader::Field { ty, id } => match id {
                1 => {
                    expect_type(ty, CompactType::I32)?;
                    header.page_type = PageType::from_thrift(reader.read_i32()?)?;
                }
                2 => {
                    expect_type(ty, CompactType::I32)?;
                    header.num_bytes = reader.read_i32()?;
                }
                5 => {
                    expect_type(ty, CompactType::Struct)?;
                    read_data_page_header(reader, &mut header)?;
                }
                _ => reader.skip(ty)?,
            },
        }
    }
    reader.read_struct_end()?;
    Ok(header)
}
