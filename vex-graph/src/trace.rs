//! The compress-time execution trace and its decode-time replay.
//!
//! Compression runs each node in pre-order (a node runs before its
//! successors) and appends one [`TraceEntry`] per invocation to a flat
//! list. Decompression replays that list in *reverse* as a small stack
//! machine: each entry knows exactly how many items to pop off a shared
//! stack (its declared input/output arity), so the original nesting is
//! reconstructed without storing explicit parent/child pointers
//! (`spec.md` §4.C, §4.E).

use vex_core::error::{Error, ErrorCode, Result};
use vex_core::stream::{IntMetadata, StreamType, TypedStream};
use vex_core::wire::varint;

use crate::graph::GraphId;
use crate::node::NodeId;

fn zigzag_encode_i64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode_i64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn encode_int_metadata(metadata: &IntMetadata, out: &mut Vec<u8>) {
    let pairs: Vec<(u16, i64)> = metadata.iter().collect();
    varint::encode(pairs.len() as u64, out);
    for (key, value) in pairs {
        varint::encode(key as u64, out);
        varint::encode(zigzag_encode_i64(value), out);
    }
}

fn decode_int_metadata(input: &[u8], pos: &mut usize) -> Result<IntMetadata> {
    let count = decode_varint_usize(input, pos)?;
    let mut metadata = IntMetadata::new();
    for _ in 0..count {
        let key = decode_varint_usize(input, pos)? as u16;
        let (raw, consumed) = varint::decode_strict(&input[*pos..])?;
        *pos += consumed;
        metadata.set(key, zigzag_decode_i64(raw));
    }
    Ok(metadata)
}

/// The shape of a stream as recorded at compress time: enough to
/// reconstruct an equivalent (empty) stream before a leaf decoder fills
/// it in, without re-deriving the shape from the payload.
#[derive(Debug, Clone)]
pub struct StreamShape {
    /// The stream's element type.
    pub ty: StreamType,
    /// Element width in bytes (0 for variable-width string elements).
    pub width: usize,
    /// Number of elements.
    pub num_elements: usize,
    /// Per-element byte lengths, present only for `StreamType::String`.
    pub string_lengths: Option<Vec<u32>>,
    /// Integer metadata tags carried on the stream at the moment it was
    /// consumed, preserved across the round trip (`spec.md` §8
    /// "integer metadata keys ... are also preserved").
    pub int_metadata: IntMetadata,
}

impl StreamShape {
    /// Derive the shape of an already-committed stream.
    pub fn of(stream: &TypedStream) -> Self {
        Self {
            ty: stream.ty(),
            width: stream.width(),
            num_elements: stream.num_elements(),
            string_lengths: if stream.ty() == StreamType::String {
                Some(stream.string_lengths())
            } else {
                None
            },
            int_metadata: stream.int_metadata(),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.ty as u8);
        varint::encode(self.width as u64, out);
        varint::encode(self.num_elements as u64, out);
        match &self.string_lengths {
            Some(lengths) => {
                varint::encode(lengths.len() as u64, out);
                for l in lengths {
                    varint::encode(*l as u64, out);
                }
            }
            None => varint::encode(0, out),
        }
        encode_int_metadata(&self.int_metadata, out);
    }

    fn decode(input: &[u8], pos: &mut usize) -> Result<Self> {
        let ty = decode_stream_type(input, pos)?;
        let width = decode_varint_usize(input, pos)?;
        let num_elements = decode_varint_usize(input, pos)?;
        let len_count = decode_varint_usize(input, pos)?;
        let string_lengths = if ty == StreamType::String {
            let mut lengths = Vec::with_capacity(len_count);
            for _ in 0..len_count {
                lengths.push(decode_varint_usize(input, pos)? as u32);
            }
            Some(lengths)
        } else {
            None
        };
        let int_metadata = decode_int_metadata(input, pos)?;
        Ok(Self {
            ty,
            width,
            num_elements,
            string_lengths,
            int_metadata,
        })
    }
}

fn decode_stream_type(input: &[u8], pos: &mut usize) -> Result<StreamType> {
    let byte = *input
        .get(*pos)
        .ok_or_else(|| Error::new(ErrorCode::Corruption, "truncated trace: stream type"))?;
    *pos += 1;
    StreamType::from_u8(byte)
        .ok_or_else(|| Error::new(ErrorCode::Corruption, "trace: unknown stream type tag"))
}

fn decode_varint_usize(input: &[u8], pos: &mut usize) -> Result<usize> {
    let (value, consumed) = varint::decode_strict(&input[*pos..])?;
    *pos += consumed;
    Ok(value as usize)
}

/// One group of members produced by splitting an N-ary clustering input
/// (`spec.md` §4.K); self-describes enough to restore the original
/// stream list at decode time.
#[derive(Debug, Clone)]
pub struct ClusterGroup {
    /// Members of this group, in original relative order.
    pub members: Vec<OriginalMember>,
}

/// A single original stream's position and shape within a cluster split.
#[derive(Debug, Clone)]
pub struct OriginalMember {
    /// Index of this stream among the clustering node's original inputs.
    pub original_index: usize,
    /// Shape of the original stream.
    pub shape: StreamShape,
}

/// One elementary operation a [`crate::graph::FunctionGraph`] callback
/// performed on one of its edges, in call order (`spec.md` §4.H). Stored
/// as one flat recipe inside [`TraceEntry::Function`] rather than as
/// separate top-level trace entries, since the callback may run nodes on
/// several open edges before terminating any of them — an interleaving
/// the flat, implicitly-nested trace can't otherwise represent.
#[derive(Debug, Clone)]
pub enum FunctionOp {
    /// Ran a transform node on `edge`, replacing it with `outputs`.
    RunTransform {
        /// The node that ran.
        node: NodeId,
        /// The edge consumed.
        edge: usize,
        /// Freshly opened edges, one per declared output port.
        outputs: Vec<usize>,
    },
    /// Ran a leaf node on `edge`, terminating it with an opaque payload.
    RunLeaf {
        /// The node that ran.
        node: NodeId,
        /// The edge consumed.
        edge: usize,
        /// Shape of the stream the leaf consumed.
        shape: StreamShape,
        /// Leaf-specific opaque header bytes.
        header: Vec<u8>,
        /// Byte offset of this leaf's payload within the chunk's payload
        /// section.
        payload_offset: usize,
        /// Length in bytes of this leaf's payload.
        payload_len: usize,
    },
    /// Split `edge` into `outputs.len()` contiguous segments of
    /// `sizes[i]` elements each.
    RunSplit {
        /// The edge consumed.
        edge: usize,
        /// Freshly opened edges, one per segment, in order.
        outputs: Vec<usize>,
        /// Element count of each segment, matching `outputs` in order.
        sizes: Vec<usize>,
        /// Element type shared by `edge` and every segment.
        ty: StreamType,
        /// Element width shared by `edge` and every segment.
        width: usize,
    },
    /// Terminated `edge` by routing it to a successor graph; that
    /// graph's own trace is spliced in immediately after the owning
    /// [`TraceEntry::Function`], in the order its `SetDestination` ops
    /// were recorded.
    SetDestination {
        /// The edge terminated.
        edge: usize,
    },
}

impl FunctionOp {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            FunctionOp::RunTransform { node, edge, outputs } => {
                out.push(0);
                varint::encode(node.0 as u64, out);
                varint::encode(*edge as u64, out);
                varint::encode(outputs.len() as u64, out);
                for o in outputs {
                    varint::encode(*o as u64, out);
                }
            }
            FunctionOp::RunLeaf {
                node,
                edge,
                shape,
                header,
                payload_offset,
                payload_len,
            } => {
                out.push(1);
                varint::encode(node.0 as u64, out);
                varint::encode(*edge as u64, out);
                shape.encode(out);
                varint::encode(header.len() as u64, out);
                out.extend_from_slice(header);
                varint::encode(*payload_offset as u64, out);
                varint::encode(*payload_len as u64, out);
            }
            FunctionOp::RunSplit { edge, outputs, sizes, ty, width } => {
                out.push(2);
                varint::encode(*edge as u64, out);
                varint::encode(outputs.len() as u64, out);
                for o in outputs {
                    varint::encode(*o as u64, out);
                }
                for s in sizes {
                    varint::encode(*s as u64, out);
                }
                out.push(*ty as u8);
                varint::encode(*width as u64, out);
            }
            FunctionOp::SetDestination { edge } => {
                out.push(3);
                varint::encode(*edge as u64, out);
            }
        }
    }

    fn decode(input: &[u8], pos: &mut usize) -> Result<Self> {
        let tag = *input
            .get(*pos)
            .ok_or_else(|| Error::new(ErrorCode::Corruption, "truncated trace: function op tag"))?;
        *pos += 1;
        match tag {
            0 => {
                let node = NodeId(decode_varint_usize(input, pos)? as u32);
                let edge = decode_varint_usize(input, pos)?;
                let num_outputs = decode_varint_usize(input, pos)?;
                let mut outputs = Vec::with_capacity(num_outputs);
                for _ in 0..num_outputs {
                    outputs.push(decode_varint_usize(input, pos)?);
                }
                Ok(FunctionOp::RunTransform { node, edge, outputs })
            }
            1 => {
                let node = NodeId(decode_varint_usize(input, pos)? as u32);
                let edge = decode_varint_usize(input, pos)?;
                let shape = StreamShape::decode(input, pos)?;
                let header_len = decode_varint_usize(input, pos)?;
                let start = *pos;
                let end = start
                    .checked_add(header_len)
                    .filter(|&e| e <= input.len())
                    .ok_or_else(|| Error::new(ErrorCode::Corruption, "truncated trace: function leaf header"))?;
                let header = input[start..end].to_vec();
                *pos = end;
                let payload_offset = decode_varint_usize(input, pos)?;
                let payload_len = decode_varint_usize(input, pos)?;
                Ok(FunctionOp::RunLeaf {
                    node,
                    edge,
                    shape,
                    header,
                    payload_offset,
                    payload_len,
                })
            }
            2 => {
                let edge = decode_varint_usize(input, pos)?;
                let num_outputs = decode_varint_usize(input, pos)?;
                let mut outputs = Vec::with_capacity(num_outputs);
                for _ in 0..num_outputs {
                    outputs.push(decode_varint_usize(input, pos)?);
                }
                let mut sizes = Vec::with_capacity(num_outputs);
                for _ in 0..num_outputs {
                    sizes.push(decode_varint_usize(input, pos)?);
                }
                let ty = decode_stream_type(input, pos)?;
                let width = decode_varint_usize(input, pos)?;
                Ok(FunctionOp::RunSplit { edge, outputs, sizes, ty, width })
            }
            3 => {
                let edge = decode_varint_usize(input, pos)?;
                Ok(FunctionOp::SetDestination { edge })
            }
            _ => Err(Error::new(ErrorCode::Corruption, "trace: unknown function op tag")),
        }
    }
}

/// One step of the recorded execution, in the order it ran at compress
/// time (pre-order: a node before its successors).
#[derive(Debug, Clone)]
pub enum TraceEntry {
    /// A transform node ran, consuming one input and producing `outputs`
    /// shapes (the actual output streams were recursively processed by
    /// further, already-appended, trace entries).
    Transform {
        /// The node that ran.
        node: NodeId,
        /// Number of output streams this invocation produced; decode pops
        /// this many items off the stack and feeds them to the kernel's
        /// inverse.
        num_outputs: usize,
    },
    /// A leaf codec ran, consuming one input and terminating that branch
    /// with an opaque header+payload pair.
    Leaf {
        /// The node that ran.
        node: NodeId,
        /// Shape of the stream the leaf consumed (needed by the inverse
        /// to reconstruct an equivalent stream from the opaque payload).
        shape: StreamShape,
        /// Leaf-specific opaque header bytes.
        header: Vec<u8>,
        /// Byte offset of this leaf's payload within the chunk's payload
        /// section; length is implied by the next leaf's offset or the
        /// section end.
        payload_offset: usize,
        /// Length in bytes of this leaf's payload.
        payload_len: usize,
    },
    /// A clustering graph ran, splitting its N original inputs into
    /// groups, each group's concatenation then fed to a further
    /// (already-appended) successor trace.
    ClusterSplit {
        /// The clustering graph that ran.
        graph: GraphId,
        /// The groups produced, in the order their concatenations were
        /// fed to successors.
        groups: Vec<ClusterGroup>,
    },
    /// A function graph ran, recording the callback's whole edge-routing
    /// recipe; each `SetDestination` op's successor trace is spliced in
    /// immediately after, in call order (`spec.md` §4.H).
    Function {
        /// The function graph that ran.
        graph: GraphId,
        /// The callback's recorded operations, in call order.
        ops: Vec<FunctionOp>,
    },
}

impl TraceEntry {
    /// Encode this entry to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            TraceEntry::Transform { node, num_outputs } => {
                out.push(0);
                varint::encode(node.0 as u64, out);
                varint::encode(*num_outputs as u64, out);
            }
            TraceEntry::Leaf {
                node,
                shape,
                header,
                payload_offset,
                payload_len,
            } => {
                out.push(1);
                varint::encode(node.0 as u64, out);
                shape.encode(out);
                varint::encode(header.len() as u64, out);
                out.extend_from_slice(header);
                varint::encode(*payload_offset as u64, out);
                varint::encode(*payload_len as u64, out);
            }
            TraceEntry::ClusterSplit { graph, groups } => {
                out.push(2);
                varint::encode(graph.0 as u64, out);
                varint::encode(groups.len() as u64, out);
                for group in groups {
                    varint::encode(group.members.len() as u64, out);
                    for member in &group.members {
                        varint::encode(member.original_index as u64, out);
                        member.shape.encode(out);
                    }
                }
            }
            TraceEntry::Function { graph, ops } => {
                out.push(3);
                varint::encode(graph.0 as u64, out);
                varint::encode(ops.len() as u64, out);
                for op in ops {
                    op.encode(out);
                }
            }
        }
    }

    /// Decode one entry starting at `*pos`, advancing `*pos` past it.
    pub fn decode(input: &[u8], pos: &mut usize) -> Result<Self> {
        let tag = *input
            .get(*pos)
            .ok_or_else(|| Error::new(ErrorCode::Corruption, "truncated trace: tag"))?;
        *pos += 1;
        match tag {
            0 => {
                let node = NodeId(decode_varint_usize(input, pos)? as u32);
                let num_outputs = decode_varint_usize(input, pos)?;
                Ok(TraceEntry::Transform { node, num_outputs })
            }
            1 => {
                let node = NodeId(decode_varint_usize(input, pos)? as u32);
                let shape = StreamShape::decode(input, pos)?;
                let header_len = decode_varint_usize(input, pos)?;
                let start = *pos;
                let end = start
                    .checked_add(header_len)
                    .filter(|&e| e <= input.len())
                    .ok_or_else(|| {
                        Error::new(ErrorCode::Corruption, "truncated trace: leaf header")
                    })?;
                let header = input[start..end].to_vec();
                *pos = end;
                let payload_offset = decode_varint_usize(input, pos)?;
                let payload_len = decode_varint_usize(input, pos)?;
                Ok(TraceEntry::Leaf {
                    node,
                    shape,
                    header,
                    payload_offset,
                    payload_len,
                })
            }
            2 => {
                let graph = GraphId(decode_varint_usize(input, pos)? as u32);
                let num_groups = decode_varint_usize(input, pos)?;
                let mut groups = Vec::with_capacity(num_groups);
                for _ in 0..num_groups {
                    let num_members = decode_varint_usize(input, pos)?;
                    let mut members = Vec::with_capacity(num_members);
                    for _ in 0..num_members {
                        let original_index = decode_varint_usize(input, pos)?;
                        let shape = StreamShape::decode(input, pos)?;
                        members.push(OriginalMember {
                            original_index,
                            shape,
                        });
                    }
                    groups.push(ClusterGroup { members });
                }
                Ok(TraceEntry::ClusterSplit { graph, groups })
            }
            3 => {
                let graph = GraphId(decode_varint_usize(input, pos)? as u32);
                let num_ops = decode_varint_usize(input, pos)?;
                let mut ops = Vec::with_capacity(num_ops);
                for _ in 0..num_ops {
                    ops.push(FunctionOp::decode(input, pos)?);
                }
                Ok(TraceEntry::Function { graph, ops })
            }
            _ => Err(Error::new(ErrorCode::Corruption, "trace: unknown entry tag")),
        }
    }
}

/// A flat, append-only execution trace, encoded/decoded as a unit.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    /// An empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning its index.
    pub fn push(&mut self, entry: TraceEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Append every entry of `other`, in order, consuming it.
    pub(crate) fn extend_from(&mut self, other: Trace) {
        self.entries.extend(other.entries);
    }

    /// All entries, in compress-time (pre-order) order.
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trace has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the full trace.
    pub fn encode(&self, out: &mut Vec<u8>) {
        varint::encode(self.entries.len() as u64, out);
        for entry in &self.entries {
            entry.encode(out);
        }
    }

    /// Decode a full trace from `input`.
    pub fn decode(input: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let count = decode_varint_usize(input, &mut pos)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(TraceEntry::decode(input, &mut pos)?);
        }
        Ok(Self { entries })
    }
}
