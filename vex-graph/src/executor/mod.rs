//! The graph executor: runs compression as a pre-order depth-first walk
//! that appends one [`crate::trace::TraceEntry`] per node/graph
//! invocation, and runs decompression as a reverse-order replay of that
//! same trace treated as a stack machine (`spec.md` §4.F).
//!
//! See [`compress`] and [`decompress`] for the entry points.

pub mod compress;
pub mod decompress;

pub use compress::compress_graph;
pub use decompress::decompress_trace;
