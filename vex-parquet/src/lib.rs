//! # vex-parquet
//!
//! A lexer for uncompressed Parquet files (`spec.md` §3.4, §4.I). It
//! walks a file's page structure and schema metadata, emitting a flat
//! token stream — magic, one `(page_header, data_page)` pair per page,
//! footer — without ever inflating column values. Tokens carry enough
//! to route each data page's bytes to a typed stream downstream: a tag
//! (hash of the column's schema path), its semantic type, and its
//! per-element width.
//!
//! Metadata parsing and page-header parsing both ride on a general
//! Thrift-compact struct reader ([`thrift_reader`]), distinct from
//! [`vex_thrift`]'s fixed map/list shape kernels: Parquet's `FileMetaData`
//! and `PageHeader` are open-ended structs with skippable unknown
//! fields, not one of the closed shapes those kernels cover.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lexer;
pub mod metadata;
pub mod thrift_reader;
pub mod token;

pub use lexer::ParquetLexer;
pub use token::Token;
