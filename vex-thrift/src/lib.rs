//! # vex-thrift
//!
//! Thrift-compact protocol support for a fixed, closed set of recurring
//! map/list shapes found in Parquet file metadata (`spec.md` §4.J):
//! `map<i32,float>`, `map<i32,list<float>>`, `map<i32,list<i64>>`,
//! `map<i32,list<list<i64>>>`, `map<i32,map<i64,float>>`, `list<i32>`,
//! `list<i64>`, `list<float>`.
//!
//! Each shape has a `decode_*` function (Thrift-compact bytes to parallel
//! component arrays) and an `encode_*` function (components back to
//! bytes), and the two are exact inverses: re-encoding a decoded value
//! reproduces the original bytes, or the decode never would have
//! succeeded (`spec.md` §8 "Thrift kernel round-trip").
//!
//! `float` here is a non-standard 4-byte extension (type nibble
//! [`header::TYPE_FLOAT32`]) layered on top of the standard compact
//! protocol, since Thrift itself has no native single-precision type.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bounds;
pub mod dynamic_output;
pub mod header;
pub mod kernels;
pub mod zigzag;

pub use kernels::{array, map};
