//! Walks a Parquet file's page structure into a flat [`Token`] stream
//! (`spec.md` §4.I), without ever inflating a column's values.

use vex_core::error::{Error, ErrorCode, Result};
use vex_core::stream::StreamType;

use crate::metadata::{self, ColumnChunkMetadata, DataType, Encoding, FileMetadata, PageHeader, PageType};
use crate::thrift_reader::ThriftCompactReader;
use crate::token::{Token, TokenKind};

const PARQUET_MAGIC: u32 = 0x3152_4150; // little-endian "PAR1"
const MIN_PARQUET_SIZE: usize = 2 * 4 + 4; // two magics + one length prefix

fn read_le32(src: &[u8], offset: usize) -> Result<u32> {
    let bytes: [u8; 4] =
        src.get(offset..offset + 4).ok_or_else(|| Error::new(ErrorCode::SrcSizeTooSmall, "truncated 32-bit field"))?.try_into().unwrap();
    Ok(u32::from_le_bytes(bytes))
}

/// Hash a schema path into the stable tag every column chunk sharing
/// that path across row groups carries. Each component is followed by
/// its own length so `["a","bc"]` and `["ab","c"]` never collide, then
/// the whole buffer is digested with XXH3-64 (the same primitive
/// `vex_core::wire::checksum` uses for frame checksums).
pub fn schema_path_tag(path: &[String]) -> u32 {
    use xxhash_rust::xxh3::xxh3_64;
    let mut buf = Vec::new();
    for component in path {
        buf.extend_from_slice(component.as_bytes());
        buf.extend_from_slice(&(component.len() as u64).to_le_bytes());
    }
    (xxh3_64(&buf) & 0xffff_ffff) as u32
}

fn data_stream_type(ty: DataType) -> StreamType {
    match ty {
        DataType::Int32 | DataType::Int64 | DataType::Float | DataType::Double => StreamType::Numeric,
        DataType::Boolean | DataType::ByteArray => StreamType::Serial,
        DataType::FixedLenByteArray => StreamType::Struct,
    }
}

fn data_width(ty: DataType, schema_width: u32) -> usize {
    match ty {
        DataType::Int32 | DataType::Float => 4,
        DataType::Int64 | DataType::Double => 8,
        DataType::Boolean | DataType::ByteArray => 1,
        DataType::FixedLenByteArray => schema_width as usize,
    }
}

/// Current lex position and parsed metadata for one Parquet file.
pub struct ParquetLexer<'a> {
    src: &'a [u8],
    curr: usize,
    footer_start: usize,
    file_metadata: FileMetadata,
    read_magic: bool,
    chunk_idx: usize,
    chunk_lexed: u32,
    page_header: Option<PageHeader>,
}

impl<'a> ParquetLexer<'a> {
    /// Validate the leading/trailing magic, parse the file metadata, and
    /// set up a lexer ready to emit tokens starting from the header.
    pub fn init(src: &'a [u8]) -> Result<Self> {
        if src.len() < MIN_PARQUET_SIZE {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "file too small to be parquet"));
        }
        if read_le32(src, 0)? != PARQUET_MAGIC {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "unknown leading magic"));
        }

        let mut footer_start = src.len() - 4;
        if read_le32(src, footer_start)? != PARQUET_MAGIC {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "unknown trailing magic"));
        }

        footer_start = footer_start
            .checked_sub(4)
            .ok_or_else(|| Error::new(ErrorCode::NodeInvalidInput, "file too small for metadata length"))?;
        let metadata_size = read_le32(src, footer_start)? as usize;
        if metadata_size > footer_start {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "metadata length exceeds remaining bytes"));
        }
        footer_start -= metadata_size;

        let mut reader = ThriftCompactReader::new(&src[footer_start..footer_start + metadata_size]);
        let file_metadata = metadata::read_file_metadata(&mut reader)?;
        if reader.consumed() != metadata_size {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "file metadata did not consume its declared length"));
        }

        tracing::debug!(
            num_row_groups = file_metadata.num_row_groups,
            num_rows = file_metadata.num_rows,
            metadata_size,
            "parsed parquet file metadata"
        );

        Ok(Self {
            src,
            curr: 0,
            footer_start,
            file_metadata,
            read_magic: false,
            chunk_idx: 0,
            chunk_lexed: 0,
            page_header: None,
        })
    }

    /// Whether every byte of the file has been emitted as a token.
    pub fn finished(&self) -> bool {
        self.curr == self.src.len()
    }

    /// The parsed file metadata.
    pub fn file_metadata(&self) -> &FileMetadata {
        &self.file_metadata
    }

    fn remaining_before_footer(&self) -> usize {
        if self.curr > self.footer_start {
            0
        } else {
            self.footer_start - self.curr
        }
    }

    fn chunk_meta(&self) -> Result<&ColumnChunkMetadata> {
        self.file_metadata
            .column_chunks
            .get(self.chunk_idx)
            .ok_or_else(|| Error::new(ErrorCode::NodeInvalidInput, "column chunk index exceeds metadata"))
    }

    fn lex_magic(&mut self) -> Result<Token> {
        if read_le32(self.src, self.curr)? != PARQUET_MAGIC {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "unknown magic"));
        }
        let token = Token { offset: self.curr, size: 4, kind: TokenKind::Magic };
        self.curr += 4;
        self.read_magic = true;
        Ok(token)
    }

    fn lex_footer(&mut self) -> Result<Token> {
        let size = self.src.len() - self.footer_start;
        let token = Token { offset: self.curr, size, kind: TokenKind::Footer };
        self.curr += size;
        Ok(token)
    }

    fn lex_page_header(&mut self) -> Result<Token> {
        let offset = self.curr;
        let mut reader = ThriftCompactReader::new(&self.src[self.curr..self.footer_start]);
        let mut header = metadata::read_page_header(&mut reader)?;
        let mut size = reader.consumed();

        if header.page_type == PageType::DataPage {
            if header.rl_encoding != Encoding::Rle {
                return Err(Error::new(ErrorCode::NodeInvalidInput, "repetition levels are not RLE-encoded"));
            }
            if header.dl_encoding != Encoding::Rle {
                return Err(Error::new(ErrorCode::NodeInvalidInput, "definition levels are not RLE-encoded"));
            }
            let levels_offset = self.curr + size;
            if self.footer_start - levels_offset < 4 {
                return Err(Error::new(ErrorCode::NodeInvalidInput, "truncated level block length"));
            }
            let level_bytes = read_le32(self.src, levels_offset)? as usize;
            size += 4;
            if self.footer_start - (self.curr + size) < level_bytes {
                return Err(Error::new(ErrorCode::NodeInvalidInput, "truncated level block"));
            }
            size += level_bytes;

            let levels_total = level_bytes as i64 + 4;
            if (header.num_bytes as i64) < levels_total {
                return Err(Error::new(ErrorCode::NodeInvalidInput, "page size smaller than its level block"));
            }
            header.num_bytes -= levels_total as i32;
        }

        self.curr += size;
        self.chunk_lexed += size as u32;
        self.page_header = Some(header);
        Ok(Token { offset, size, kind: TokenKind::PageHeader })
    }

    fn lex_data_page(&mut self) -> Result<Token> {
        let header = self.page_header.expect("page header set before a data page is lexed");
        if header.encoding != Encoding::Plain {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "only PLAIN-encoded data pages are supported"));
        }
        let size = header.num_bytes as usize;
        let offset = self.curr;
        if self.footer_start - offset < size {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "data page overruns its column chunk"));
        }

        let chunk = self.chunk_meta()?;
        let schema_leaf = self
            .file_metadata
            .schema
            .get(&chunk.path_in_schema)
            .ok_or_else(|| Error::new(ErrorCode::NodeInvalidInput, "data page references an unknown schema path"))?;
        if schema_leaf.data_type != chunk.data_type {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "column chunk type disagrees with its schema leaf"));
        }

        let tag = schema_path_tag(&chunk.path_in_schema);
        let data_type = data_stream_type(chunk.data_type);
        let width = data_width(chunk.data_type, schema_leaf.type_width);

        self.curr += size;
        self.chunk_lexed += size as u32;
        self.page_header = None;
        Ok(Token { offset, size, kind: TokenKind::DataPage { tag, data_type, width } })
    }

    fn lex_one(&mut self) -> Result<Token> {
        if !self.read_magic {
            return self.lex_magic();
        }
        if self.curr == self.footer_start {
            return self.lex_footer();
        }
        if self.chunk_idx >= self.file_metadata.column_chunks.len() {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "ran out of column chunks before reaching the footer"));
        }

        let chunk_total = self.chunk_meta()?.num_bytes;
        if chunk_total < 0 {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "column chunk declares a negative size"));
        }
        let mut chunk_remaining = chunk_total as i64 - self.chunk_lexed as i64;
        if chunk_remaining == 0 {
            self.chunk_idx += 1;
            self.chunk_lexed = 0;
            chunk_remaining = self.chunk_meta()?.num_bytes;
        }
        if chunk_remaining < 0 {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "lexed more of a column chunk than it declares"));
        }
        if self.remaining_before_footer() < chunk_remaining as usize {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "column chunk extends past the footer"));
        }

        if self.page_header.is_none() {
            return self.lex_page_header();
        }
        if self.page_header.unwrap().page_type == PageType::DataPage {
            return self.lex_data_page();
        }
        Err(Error::new(ErrorCode::NodeInvalidInput, "unsupported page type"))
    }

    /// Lex every remaining token through end-of-file.
    pub fn lex_all(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while !self.finished() {
            tokens.push(self.lex_one()?);
        }
        Ok(tokens)
    }
}
