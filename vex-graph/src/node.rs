//! Nodes: typed transforms and leaf codecs (`spec.md` §3.2, §4.E).

use std::rc::Rc;
use vex_core::error::Result;
use vex_core::stream::{IntMetadata, TypeMask, TypedStream};

/// Stable identifier for a registered node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Local parameters attached to a node invocation: small integer params
/// keyed by id (`spec.md` §3.2 "Parameterized graph / node").
pub type NodeParams = IntMetadata;

/// A non-terminal transform: consumes its declared inputs and produces a
/// fixed number of committed output streams, each wired to a successor
/// graph. Must be invertible: `decode` reconstructs the original inputs
/// from the (possibly-transformed) outputs.
pub trait TransformKernel {
    /// Encode: produce this node's output streams from its inputs.
    fn encode(&self, inputs: &[TypedStream], params: &NodeParams) -> Result<Vec<TypedStream>>;

    /// Decode: reconstruct the original inputs from the node's outputs.
    fn decode(&self, outputs: &[TypedStream], params: &NodeParams) -> Result<Vec<TypedStream>>;
}

/// A terminal (leaf) codec: serializes its inputs to an opaque byte
/// payload plus a small opaque header, and can reconstruct the original
/// inputs from that payload given the original stream shape.
pub trait LeafKernel {
    /// Encode: produce `(codec_header, payload)` for this leaf's inputs.
    fn encode(&self, inputs: &[TypedStream], params: &NodeParams) -> Result<(Vec<u8>, Vec<u8>)>;

    /// Decode: reconstruct the original inputs from `header` + `payload`,
    /// given the original stream shapes recorded at compress time.
    fn decode(
        &self,
        header: &[u8],
        payload: &[u8],
        shapes: &[crate::trace::StreamShape],
        params: &NodeParams,
    ) -> Result<Vec<TypedStream>>;
}

/// Either flavor of node kernel.
pub enum NodeKind {
    /// A non-terminal transform node.
    Transform(Rc<dyn TransformKernel>),
    /// A terminal leaf codec.
    Leaf(Rc<dyn LeafKernel>),
}

/// A registered node: its identity, shape contract, and implementation.
pub struct NodeDescriptor {
    id: NodeId,
    name: String,
    num_inputs: usize,
    input_mask: TypeMask,
    /// Declared output types, one per output port. Empty for leaf nodes
    /// (their "output" is an opaque byte payload, not typed streams).
    output_types: Vec<vex_core::stream::StreamType>,
    min_format_version: u16,
    kind: NodeKind,
    local_params: NodeParams,
}

impl NodeDescriptor {
    /// Construct a new node descriptor with no local parameters baked in.
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        num_inputs: usize,
        input_mask: TypeMask,
        output_types: Vec<vex_core::stream::StreamType>,
        min_format_version: u16,
        kind: NodeKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            num_inputs,
            input_mask,
            output_types,
            min_format_version,
            kind,
            local_params: NodeParams::new(),
        }
    }

    /// Replace this descriptor's baked-in local parameters, as done by
    /// [`crate::registry::Registry::clone_node`] (`spec.md` §3.2).
    pub fn with_local_params(mut self, local_params: NodeParams) -> Self {
        self.local_params = local_params;
        self
    }

    /// The local parameters baked into every invocation of this node.
    pub fn local_params(&self) -> &NodeParams {
        &self.local_params
    }

    /// This node's stable identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// This node's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of input ports this node declares.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// The type mask every input port must satisfy.
    pub fn input_mask(&self) -> TypeMask {
        self.input_mask
    }

    /// Declared output types (empty for leaf nodes).
    pub fn output_types(&self) -> &[vex_core::stream::StreamType] {
        &self.output_types
    }

    /// Number of output ports (0 for leaf nodes, whose single "output" is
    /// an opaque payload rather than a typed stream).
    pub fn num_outputs(&self) -> usize {
        self.output_types.len()
    }

    /// The minimum wire format version in which this node's inverse exists.
    pub fn min_format_version(&self) -> u16 {
        self.min_format_version
    }

    /// Whether this is a terminal (leaf) node.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// This node's kernel implementation.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Clone this descriptor with a new id and replacement local
    /// parameters baked in is not performed here (parameters are supplied
    /// per-invocation); `clone_node` at the registry level rebinds the id
    /// while sharing the same kernel (`spec.md` §4.E).
    pub fn share_kind(&self) -> NodeKind {
        match &self.kind {
            NodeKind::Transform(k) => NodeKind::Transform(Rc::clone(k)),
            NodeKind::Leaf(k) => NodeKind::Leaf(Rc::clone(k)),
        }
    }
}
