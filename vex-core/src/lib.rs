//! # vex-core
//!
//! Core primitives for the `vex` compression-pipeline toolkit:
//!
//! - [`error`]: scoped, stable-coded error reporting
//! - [`arena`]: a scoped bump allocator for per-operation transient data
//! - [`stream`]: the typed stream, the central datum every node consumes
//!   and produces
//! - [`wire`]: magic/version header, varints, and XXH3 checksums shared
//!   by the frame layer in `vex-graph`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Graph executor (vex-graph)                              │
//! │     registry, compress/decompress, selectors, clustering │
//! ├─────────────────────────────────────────────────────────┤
//! │ Typed stream + wire primitives (this crate)              │
//! │     TypedStream, Arena, Error, varint, magic, checksum   │
//! └─────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod arena;
pub mod error;
pub mod stream;
pub mod wire;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::arena::Arena;
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::stream::{IntMetadata, StreamType, TypeMask, TypedStream};
}
