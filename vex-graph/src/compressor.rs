//! The public entry point: a [`Compressor`] bundles a node/graph
//! [`Registry`] with [`Parameters`] and drives full compress/decompress
//! calls end to end (`spec.md` §6).

use tracing::info_span;

use vex_core::error::Result;
use vex_core::stream::TypedStream;

use crate::executor::{compress_graph, decompress_trace};
use crate::frame::{ChecksumConfig, Chunk, Frame};
use crate::graph::GraphId;
use crate::params::Parameters;
use crate::registry::Registry;
use crate::trace::Trace;

/// Metadata read from a frame's header without fully decompressing it
/// (`spec.md` §6 `frame-info`).
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// The frame's negotiated format version.
    pub format_version: u16,
    /// Whether a content checksum is present.
    pub has_content_checksum: bool,
    /// Whether a compressed-frame checksum is present.
    pub has_compressed_checksum: bool,
}

/// The bytes a content checksum covers for a (possibly multi-stream)
/// compress/decompress call: each stream's raw content, concatenated in
/// order.
fn concat_content(streams: &[TypedStream]) -> Vec<u8> {
    let mut out = Vec::new();
    for s in streams {
        s.with_bytes(|b| out.extend_from_slice(b));
    }
    out
}

/// Owns a node/graph registry and drives compression and decompression
/// against it under a given [`Parameters`] configuration.
pub struct Compressor {
    registry: Registry,
    params: Parameters,
}

impl Compressor {
    /// Build a compressor over `registry` with `params`.
    pub fn new(registry: Registry, params: Parameters) -> Self {
        Self { registry, params }
    }

    /// This compressor's current parameters.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Replace this compressor's parameters (`spec.md` §6 `set_parameter`).
    /// If [`Parameters::sticky_parameters`] is false on the new value, a
    /// caller is expected to call this before every compress/decompress
    /// call rather than relying on the previous configuration persisting.
    pub fn set_parameters(&mut self, params: Parameters) {
        self.params = params;
    }

    /// The negotiated format version, or `FormatVersionNotSet` if this
    /// compressor's parameters have never had one set (`spec.md` §4.D:
    /// "setting no version on a compressor is an error at first compress
    /// call").
    fn resolved_format_version(&self) -> Result<u16> {
        self.params.format_version().ok_or_else(|| {
            vex_core::error::Error::new(
                vex_core::error::ErrorCode::FormatVersionNotSet,
                "no format version set on this compressor",
            )
        })
    }

    /// Validate that `root` (and everything reachable from it) is
    /// well-formed under the compressor's negotiated format version,
    /// before any data is touched (`spec.md` §4.F, §8 "Format-version
    /// floor"). Called automatically by [`Compressor::compress`], but
    /// exposed so a caller can validate a graph once and reuse it across
    /// many compress calls.
    pub fn validate(&self, root: GraphId) -> Result<()> {
        let version = self.resolved_format_version()?;
        self.registry.validate_graph(root, version)
    }

    /// Compress a single `input` by running `root`. Convenience over
    /// [`Compressor::compress_multi`] for the common (non-clustering)
    /// single-stream case.
    pub fn compress(&self, root: GraphId, input: TypedStream) -> Result<Vec<u8>> {
        self.compress_multi(root, vec![input])
    }

    /// Compress `inputs` by running `root`, assembling a frame with the
    /// checksums this compressor is configured for. `root` must accept
    /// `inputs.len()` streams: exactly 1 for every graph kind except
    /// [`crate::graph::GraphKind::Cluster`], which accepts any N.
    pub fn compress_multi(&self, root: GraphId, inputs: Vec<TypedStream>) -> Result<Vec<u8>> {
        let version = self.resolved_format_version()?;
        let _span = info_span!("compress", graph = root.0, version).entered();
        self.validate(root)?;
        vex_core::wire::limits::ResourceLimits::for_version(version).check_runtime_streams(inputs.len())?;

        let original_content = self.params.content_checksum().then(|| concat_content(&inputs));

        let mut trace = Trace::new();
        let mut payloads = Vec::new();
        compress_graph(&self.registry, root, &inputs, &mut trace, &mut payloads)?;

        let frame = Frame {
            version,
            chunk: Chunk { trace, payloads },
            checksums: ChecksumConfig {
                content_checksum: self.params.content_checksum(),
                compressed_checksum: self.params.compressed_checksum(),
            },
            original_content,
        };
        frame.encode()
    }

    /// Decompress a frame produced by [`Compressor::compress`], expecting
    /// exactly one reconstructed top-level stream.
    pub fn decompress(&self, bytes: &[u8]) -> Result<TypedStream> {
        let mut streams = self.decompress_multi(bytes)?;
        if streams.len() != 1 {
            return Err(vex_core::error::Error::new(
                vex_core::error::ErrorCode::Corruption,
                format!("expected exactly one top-level stream, got {}", streams.len()),
            ));
        }
        Ok(streams.remove(0))
    }

    /// Decompress a frame produced by [`Compressor::compress_multi`].
    /// Content checksum verification (if the frame carries one) happens
    /// against the just-reconstructed bytes, so no separate caller-
    /// supplied content is needed on this path.
    pub fn decompress_multi(&self, bytes: &[u8]) -> Result<Vec<TypedStream>> {
        let _span = info_span!("decompress").entered();
        // The compressed-frame checksum (if any) is verified here, since
        // every byte it covers is already available. The content
        // checksum covers the *decompressed* bytes, so it can only be
        // checked after the executor reconstructs them below.
        let (chunk, _version, checksums) = Frame::decode_unverified(bytes)?;
        let reconstructed = decompress_trace(&self.registry, &chunk.trace, &chunk.payloads)?;
        if checksums.content_checksum {
            let content = concat_content(&reconstructed);
            Frame::verify_content_checksum(bytes, &content, checksums)?;
        }
        Ok(reconstructed)
    }

    /// Read a frame's header metadata without running the executor
    /// (`spec.md` §6 `frame-info`).
    pub fn frame_info(bytes: &[u8]) -> Result<FrameInfo> {
        let (version, flags, _) = vex_core::wire::magic::read_header(bytes)?;
        Ok(FrameInfo {
            format_version: version,
            has_content_checksum: flags & 0b01 != 0,
            has_compressed_checksum: flags & 0b10 != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::store::Store;
    use crate::graph::{GraphDescriptor, GraphKind, Successor};
    use crate::node::{NodeDescriptor, NodeId, NodeKind};
    use std::rc::Rc;
    use vex_core::stream::{StreamType, TypeMask};

    fn store_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_node(NodeDescriptor::new(
                NodeId(1),
                "store",
                1,
                TypeMask::all(),
                vec![],
                1,
                NodeKind::Leaf(Rc::new(Store)),
            ))
            .unwrap();
        registry
            .register_graph(GraphDescriptor::new(
                GraphId(1),
                "store_graph",
                TypeMask::all(),
                GraphKind::Static(Successor {
                    node: NodeId(1),
                    next: vec![],
                }),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn compress_then_decompress_round_trips() {
        let params = Parameters::new().with_format_version(1).unwrap();
        let compressor = Compressor::new(store_registry(), params);

        let s = TypedStream::create(StreamType::Serial, 1).unwrap();
        s.reserve(5).unwrap();
        s.write_bytes(b"hello").unwrap();
        s.commit(5).unwrap();

        let bytes = compressor.compress(GraphId(1), s.clone()).unwrap();
        let info = Compressor::frame_info(&bytes).unwrap();
        assert_eq!(info.format_version, 1);

        let decompressed = compressor.decompress(&bytes).unwrap();
        decompressed.with_bytes(|got| s.with_bytes(|orig| assert_eq!(got, orig)));
    }

    #[test]
    fn format_version_floor_is_rejected_before_any_output() {
        let mut registry = Registry::new();
        registry
            .register_node(NodeDescriptor::new(
                NodeId(1),
                "needs_v3",
                1,
                TypeMask::all(),
                vec![],
                3,
                NodeKind::Leaf(Rc::new(Store)),
            ))
            .unwrap();
        registry
            .register_graph(GraphDescriptor::new(
                GraphId(1),
                "g",
                TypeMask::all(),
                GraphKind::Static(Successor {
                    node: NodeId(1),
                    next: vec![],
                }),
            ))
            .unwrap();

        let params = Parameters::new().with_format_version(1).unwrap();
        let compressor = Compressor::new(registry, params);
        let s = TypedStream::create(StreamType::Serial, 1).unwrap();
        s.reserve(1).unwrap();
        s.write_bytes(b"a").unwrap();
        s.commit(1).unwrap();

        let err = compressor.compress(GraphId(1), s).unwrap_err();
        assert_eq!(err.code(), vex_core::error::ErrorCode::FormatVersionUnsupported);
    }

    #[test]
    fn unset_format_version_is_rejected_at_first_compress_call() {
        let compressor = Compressor::new(store_registry(), Parameters::new());
        let s = TypedStream::create(StreamType::Serial, 1).unwrap();
        s.reserve(1).unwrap();
        s.write_bytes(b"a").unwrap();
        s.commit(1).unwrap();

        let err = compressor.compress(GraphId(1), s).unwrap_err();
        assert_eq!(err.code(), vex_core::error::ErrorCode::FormatVersionNotSet);
    }

    #[test]
    fn validate_also_requires_a_format_version() {
        let compressor = Compressor::new(store_registry(), Parameters::new());
        let err = compressor.validate(GraphId(1)).unwrap_err();
        assert_eq!(err.code(), vex_core::error::ErrorCode::FormatVersionNotSet);
    }
}
