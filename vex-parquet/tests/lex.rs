//! End-to-end scenario from `spec.md` §8: lexing a two-column,
//! two-row-group Parquet file produces the expected token stream and
//! its token ranges exactly tile the file.

use vex_core::stream::StreamType;
use vex_core::wire::varint;
use vex_parquet::lexer::{schema_path_tag, ParquetLexer};
use vex_parquet::token::TokenKind;
use vex_thrift::header;

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

fn field_header(delta: u8, type_nibble: u8) -> u8 {
    (delta << 4) | type_nibble
}

fn write_i32_field(out: &mut Vec<u8>, delta: u8, value: i32) {
    out.push(field_header(delta, header::TYPE_I32));
    header::write_i32(value, out);
}

fn write_i64_field(out: &mut Vec<u8>, delta: u8, value: i64) {
    out.push(field_header(delta, header::TYPE_I64));
    header::write_i64(value, out);
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    varint::encode(s.len() as u64, out);
    out.extend_from_slice(s.as_bytes());
}

fn write_string_field(out: &mut Vec<u8>, delta: u8, s: &str) {
    out.push(field_header(delta, header::TYPE_BINARY));
    write_string(out, s);
}

/// A leaf schema element: `{type, name}` (num_children implicitly 0).
fn build_leaf_schema_element(data_type: i32, name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    write_i32_field(&mut out, 1, data_type);
    write_string_field(&mut out, 3, name);
    out.push(0);
    out
}

fn build_root_schema_element(num_children: i32) -> Vec<u8> {
    let mut out = Vec::new();
    write_i32_field(&mut out, 5, num_children);
    out.push(0);
    out
}

/// One `PageHeader` struct for a PLAIN-encoded, RLE-leveled data page.
fn build_page_header(uncompressed_page_size: i32) -> Vec<u8> {
    let mut out = Vec::new();
    write_i32_field(&mut out, 1, 0); // page_type = DATA_PAGE
    write_i32_field(&mut out, 1, uncompressed_page_size); // uncompressed_page_size
    out.push(field_header(3, header::TYPE_STRUCT)); // data_page_header
    {
        write_i32_field(&mut out, 2, 0); // encoding = PLAIN
        write_i32_field(&mut out, 1, 3); // definition_level_encoding = RLE
        write_i32_field(&mut out, 1, 3); // repetition_level_encoding = RLE
        out.push(0);
    }
    out.push(0);
    out
}

/// A full on-wire data page: header, a zero-length level block, values.
fn build_page(value_bytes: &[u8]) -> Vec<u8> {
    let num_bytes = 4 + value_bytes.len() as i32; // level-length prefix + values
    let mut out = build_page_header(num_bytes);
    out.extend_from_slice(&0u32.to_le_bytes()); // level block length = 0
    out.extend_from_slice(value_bytes);
    out
}

fn int64_values(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn byte_array_values(values: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        out.extend_from_slice(&(v.len() as u32).to_le_bytes());
        out.extend_from_slice(v.as_bytes());
    }
    out
}

/// One `ColumnChunk` struct (with its nested `ColumnMetaData`).
fn build_column_chunk(data_type: i32, path_component: &str, num_bytes: i64) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(field_header(3, header::TYPE_STRUCT)); // column_metadata
    {
        write_i32_field(&mut out, 1, data_type); // type
        out.push(field_header(2, header::TYPE_LIST)); // path_in_schema
        header::write_list_header(header::TYPE_BINARY, 1, &mut out);
        write_string(&mut out, path_component);
        write_i32_field(&mut out, 1, 0); // codec = UNCOMPRESSED
        write_i64_field(&mut out, 2, num_bytes); // total_uncompressed_size
        out.push(0);
    }
    out.push(0);
    out
}

fn build_row_group(column_chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(field_header(1, header::TYPE_LIST));
    header::write_list_header(header::TYPE_STRUCT, column_chunks.len(), &mut out);
    for chunk in column_chunks {
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out
}

fn build_file_metadata(schema_elements: &[Vec<u8>], num_rows: i64, row_groups: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(field_header(2, header::TYPE_LIST));
    header::write_list_header(header::TYPE_STRUCT, schema_elements.len(), &mut out);
    for e in schema_elements {
        out.extend_from_slice(e);
    }
    write_i64_field(&mut out, 1, num_rows);
    out.push(field_header(1, header::TYPE_LIST));
    header::write_list_header(header::TYPE_STRUCT, row_groups.len(), &mut out);
    for rg in row_groups {
        out.extend_from_slice(rg);
    }
    out.push(0);
    out
}

/// Builds the two-column, two-row-group canonical uncompressed Parquet
/// file from `spec.md` §8 scenario 2.
fn build_scenario_two_file() -> Vec<u8> {
    const INT64: i32 = 2;
    const BYTE_ARRAY: i32 = 6;

    let int_values: [i64; 5] = [100, 200, 300, 400, 500];
    let str_values: [&str; 5] = ["hello", "world", "my", "name", "is"];

    let int_rg1 = build_page(&int64_values(&int_values[0..3]));
    let str_rg1 = build_page(&byte_array_values(&str_values[0..3]));
    let int_rg2 = build_page(&int64_values(&int_values[3..5]));
    let str_rg2 = build_page(&byte_array_values(&str_values[3..5]));

    let schema = [build_root_schema_element(2), build_leaf_schema_element(INT64, "int"), build_leaf_schema_element(BYTE_ARRAY, "str")];

    let row_group1 = build_row_group(&[
        build_column_chunk(INT64, "int", int_rg1.len() as i64),
        build_column_chunk(BYTE_ARRAY, "str", str_rg1.len() as i64),
    ]);
    let row_group2 = build_row_group(&[
        build_column_chunk(INT64, "int", int_rg2.len() as i64),
        build_column_chunk(BYTE_ARRAY, "str", str_rg2.len() as i64),
    ]);

    let file_metadata = build_file_metadata(&schema, 5, &[row_group1, row_group2]);

    let mut file = Vec::new();
    file.extend_from_slice(PARQUET_MAGIC);
    file.extend_from_slice(&int_rg1);
    file.extend_from_slice(&str_rg1);
    file.extend_from_slice(&int_rg2);
    file.extend_from_slice(&str_rg2);
    file.extend_from_slice(&file_metadata);
    file.extend_from_slice(&(file_metadata.len() as u32).to_le_bytes());
    file.extend_from_slice(PARQUET_MAGIC);

    file
}

#[test]
fn lexes_two_column_two_row_group_file_into_expected_token_stream() {
    let file = build_scenario_two_file();
    let mut lexer = ParquetLexer::init(&file).expect("file should be recognized as parquet");
    let tokens = lexer.lex_all().expect("lexing should succeed");

    let int_tag = schema_path_tag(&["int".to_string()]);
    let str_tag = schema_path_tag(&["str".to_string()]);
    assert_ne!(int_tag, str_tag);

    // magic, then 2 row groups x (page_header, data_page) x 2 columns, then footer.
    assert_eq!(tokens.len(), 1 + 2 * 2 * 2 + 1);

    assert!(matches!(tokens[0].kind, TokenKind::Magic));
    assert_eq!(tokens[0].size, 4);

    let expected_widths = [8usize, 1];
    let expected_tags = [int_tag, str_tag];
    let expected_types = [StreamType::Numeric, StreamType::Serial];

    let mut idx = 1;
    for row_group in 0..2 {
        for col in 0..2 {
            assert!(matches!(tokens[idx].kind, TokenKind::PageHeader), "token {idx} should be a page header");
            idx += 1;
            match &tokens[idx].kind {
                TokenKind::DataPage { tag, data_type, width } => {
                    assert_eq!(*tag, expected_tags[col]);
                    assert_eq!(*data_type, expected_types[col]);
                    assert_eq!(*width, expected_widths[col]);
                }
                other => panic!("token {idx} (row group {row_group}, column {col}) should be a data page, got {other:?}"),
            }
            idx += 1;
        }
    }

    assert!(matches!(tokens[idx].kind, TokenKind::Footer));
    idx += 1;
    assert_eq!(idx, tokens.len());

    // Coverage invariant: token ranges, concatenated in order, tile the file.
    let mut covered = 0usize;
    for token in &tokens {
        assert_eq!(token.offset, covered, "tokens must be contiguous with no gaps or overlaps");
        covered += token.size;
    }
    assert_eq!(covered, file.len());

    // The data page token carries only the value bytes, with the page
    // header and level block folded into the preceding token.
    assert_eq!(tokens[2].size, int64_values(&[100, 200, 300]).len());
}

#[test]
fn rejects_file_with_compressed_column_chunk() {
    const INT64: i32 = 2;
    let page = build_page(&int64_values(&[1, 2, 3]));
    let schema = [build_root_schema_element(1), build_leaf_schema_element(INT64, "int")];

    let mut chunk = Vec::new();
    chunk.push(field_header(3, header::TYPE_STRUCT));
    {
        write_i32_field(&mut chunk, 1, INT64);
        chunk.push(field_header(2, header::TYPE_LIST));
        header::write_list_header(header::TYPE_BINARY, 1, &mut chunk);
        write_string(&mut chunk, "int");
        write_i32_field(&mut chunk, 1, 1); // codec = SNAPPY, not UNCOMPRESSED
        write_i64_field(&mut chunk, 2, page.len() as i64);
        chunk.push(0);
    }
    chunk.push(0);

    let row_group = build_row_group(&[chunk]);
    let file_metadata = build_file_metadata(&schema, 3, &[row_group]);

    let mut file = Vec::new();
    file.extend_from_slice(PARQUET_MAGIC);
    file.extend_from_slice(&page);
    file.extend_from_slice(&file_metadata);
    file.extend_from_slice(&(file_metadata.len() as u32).to_le_bytes());
    file.extend_from_slice(PARQUET_MAGIC);

    let err = ParquetLexer::init(&file).unwrap_err();
    assert_eq!(err.code(), vex_core::error::ErrorCode::NodeInvalidInput);
}

#[test]
fn rejects_truncated_file() {
    let file = build_scenario_two_file();
    let err = ParquetLexer::init(&file[..file.len() / 2]).unwrap_err();
    assert_eq!(err.code(), vex_core::error::ErrorCode::NodeInvalidInput);
}
