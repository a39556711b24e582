//! Graphs: wiring of nodes into a compressor (`spec.md` §3.2, §4.F, §4.K).

use vex_core::error::{Error, ErrorCode, Result};
use vex_core::stream::{TypeMask, TypedStream};

use crate::node::{NodeDescriptor, NodeId, NodeKind};
use crate::trace::{FunctionOp, StreamShape, Trace, TraceEntry};

/// Stable identifier for a registered graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub u32);

/// A single wired successor: which node consumes an output port, and
/// which graph each of *that* node's outputs is in turn routed to.
#[derive(Debug, Clone)]
pub struct Successor {
    /// The node that consumes this port.
    pub node: NodeId,
    /// For each of `node`'s output ports, the graph its stream is routed
    /// into next. Empty for leaf nodes.
    pub next: Vec<GraphId>,
}

/// A dynamic choice point: given the input stream, pick which of several
/// candidate successors to run (`spec.md` §4.G).
pub trait Selector {
    /// Choose an index into `candidates` for this input. Must be a pure
    /// function of the stream's content/shape: decode does not re-run
    /// this, it only replays whichever candidate was actually chosen.
    /// `ctx` allows dry-running any registered graph against `input`
    /// before committing to a choice (`spec.md` §4.H "try a candidate").
    fn select(&self, ctx: &SelectorContext, input: &vex_core::stream::TypedStream, candidates: &[Successor]) -> usize;
}

/// The outcome of [`SelectorContext::try_graph`]: how big the candidate's
/// output would have been, and how long encoding it took.
#[derive(Debug, Clone, Copy)]
pub struct TryReport {
    /// Payload bytes the candidate would produce, running alone.
    pub compressed_size: usize,
    /// Wall-clock time the trial compression took.
    pub compress_time: std::time::Duration,
}

/// What a [`Selector`] sees while deciding: a handle back into the
/// registry that lets it dry-run any candidate graph against the input
/// it must route (`spec.md` §4.H). Side effects of a try never escape —
/// each trial gets its own disposable trace and payload buffer that is
/// dropped when `try_graph` returns.
pub struct SelectorContext<'a> {
    registry: &'a crate::registry::Registry,
}

impl<'a> SelectorContext<'a> {
    pub(crate) fn new(registry: &'a crate::registry::Registry) -> Self {
        Self { registry }
    }

    /// Run `graph_id` against `input` in an isolated trace/payload
    /// buffer and report its size and timing. Errors (e.g. a
    /// type-incompatible candidate) are returned rather than panicking,
    /// so a selector can simply skip candidates that fail to try.
    pub fn try_graph(&self, graph_id: GraphId, input: &vex_core::stream::TypedStream) -> vex_core::error::Result<TryReport> {
        let mut trace = crate::trace::Trace::new();
        let mut payloads = Vec::new();
        let start = std::time::Instant::now();
        crate::executor::compress::compress_graph(self.registry, graph_id, std::slice::from_ref(input), &mut trace, &mut payloads)?;
        Ok(TryReport {
            compressed_size: payloads.len(),
            compress_time: start.elapsed(),
        })
    }
}

/// A graph computed entirely in code rather than declared statically
/// (`spec.md` §4.G "function graph"): it inspects its input and drives
/// its own routing through an edge-operation API (`spec.md` §4.H)
/// instead of declaring a fixed [`Successor`].
pub trait FunctionGraph {
    /// Drive `root` — the graph's sole input, opened as `ctx`'s first
    /// edge — to completion: run nodes or splits on it and route every
    /// resulting edge to a successor graph. Every edge `ctx` ever opens,
    /// including `root`, must end up terminated exactly once; leaving
    /// one open, or terminating it twice, is `graph_invalid`
    /// (`spec.md` §4.H), enforced by [`FunctionGraphContext::finish`]
    /// once this returns.
    fn build(&self, ctx: &mut FunctionGraphContext, root: EdgeId) -> Result<()>;
}

/// Identifies one of a [`FunctionGraph`] callback's open edges, by
/// position within its [`FunctionGraphContext`] (`spec.md` §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeId(usize);

/// What a [`FunctionGraph`] callback drives. Every edge starts open;
/// [`Self::run_node`] and [`Self::run_split`] terminate one edge and
/// open fresh ones in its place, while [`Self::set_destination`]
/// terminates one for good by routing it onward. The callback's
/// operations are reified into one [`TraceEntry::Function`] record
/// (`spec.md` §4.H) rather than run against the shared trace directly,
/// since the callback may work several open edges before terminating
/// any of them — an order the trace's implicit pre-order nesting can't
/// otherwise represent.
pub struct FunctionGraphContext<'a> {
    registry: &'a crate::registry::Registry,
    payloads: &'a mut Vec<u8>,
    edges: Vec<Option<TypedStream>>,
    ops: Vec<FunctionOp>,
    destinations: Vec<Trace>,
}

impl<'a> FunctionGraphContext<'a> {
    pub(crate) fn new(registry: &'a crate::registry::Registry, payloads: &'a mut Vec<u8>) -> Self {
        Self {
            registry,
            payloads,
            edges: Vec::new(),
            ops: Vec::new(),
            destinations: Vec::new(),
        }
    }

    pub(crate) fn new_edge(&mut self, stream: TypedStream) -> EdgeId {
        self.edges.push(Some(stream));
        EdgeId(self.edges.len() - 1)
    }

    fn unterminated(edge: EdgeId) -> Error {
        Error::new(ErrorCode::GraphInvalid, format!("edge {:?} is unknown or already terminated", edge.0))
    }

    /// Inspect `edge`'s stream without terminating it, e.g. to decide how
    /// to route it.
    pub fn stream(&self, edge: EdgeId) -> Result<&TypedStream> {
        self.edges.get(edge.0).and_then(|s| s.as_ref()).ok_or_else(|| Self::unterminated(edge))
    }

    fn take_open(&mut self, edge: EdgeId) -> Result<TypedStream> {
        self.edges.get_mut(edge.0).and_then(|s| s.take()).ok_or_else(|| Self::unterminated(edge))
    }

    /// Run `node_id` on `edge`'s stream, terminating `edge` and returning
    /// one freshly opened edge per output the node declares (empty for a
    /// leaf node, whose "output" is an opaque payload rather than a
    /// further edge).
    pub fn run_node(&mut self, edge: EdgeId, node_id: NodeId) -> Result<Vec<EdgeId>> {
        let stream = self.take_open(edge)?;
        let node: &NodeDescriptor = self.registry.node(node_id)?;
        let params = node.local_params().clone();
        match node.kind() {
            NodeKind::Leaf(leaf) => {
                let (header, payload) = leaf.encode(std::slice::from_ref(&stream), &params)?;
                let payload_offset = self.payloads.len();
                let payload_len = payload.len();
                self.payloads.extend_from_slice(&payload);
                self.ops.push(FunctionOp::RunLeaf {
                    node: node_id,
                    edge: edge.0,
                    shape: StreamShape::of(&stream),
                    header,
                    payload_offset,
                    payload_len,
                });
                Ok(vec![])
            }
            NodeKind::Transform(transform) => {
                let outputs = transform.encode(std::slice::from_ref(&stream), &params)?;
                let output_edges: Vec<EdgeId> = outputs.into_iter().map(|s| self.new_edge(s)).collect();
                self.ops.push(FunctionOp::RunTransform {
                    node: node_id,
                    edge: edge.0,
                    outputs: output_edges.iter().map(|e| e.0).collect(),
                });
                Ok(output_edges)
            }
        }
    }

    /// Split `edge`'s stream into `sizes.len()` contiguous segments of
    /// `sizes[i]` elements each, terminating `edge` and returning one
    /// freshly opened edge per segment, in order (`spec.md` §4.H "run a
    /// split node with caller-supplied segment sizes").
    pub fn run_split(&mut self, edge: EdgeId, sizes: &[usize]) -> Result<Vec<EdgeId>> {
        let stream = self.take_open(edge)?;
        let ty = stream.ty();
        let width = stream.width();
        let segments = crate::cluster::split_by_sizes(&stream, sizes)?;
        let output_edges: Vec<EdgeId> = segments.into_iter().map(|s| self.new_edge(s)).collect();
        self.ops.push(FunctionOp::RunSplit {
            edge: edge.0,
            outputs: output_edges.iter().map(|e| e.0).collect(),
            sizes: sizes.to_vec(),
            ty,
            width,
        });
        Ok(output_edges)
    }

    /// Terminate `edge` by routing its stream to `graph_id`. Runs
    /// immediately against an isolated sub-trace, spliced into the
    /// parent trace (in call order, among other `set_destination` calls)
    /// once the whole callback returns.
    pub fn set_destination(&mut self, edge: EdgeId, graph_id: GraphId) -> Result<()> {
        let stream = self.take_open(edge)?;
        let mut sub_trace = Trace::new();
        crate::executor::compress::compress_graph(
            self.registry,
            graph_id,
            std::slice::from_ref(&stream),
            &mut sub_trace,
            self.payloads,
        )?;
        self.ops.push(FunctionOp::SetDestination { edge: edge.0 });
        self.destinations.push(sub_trace);
        Ok(())
    }

    /// Finish the callback: every edge must have been terminated exactly
    /// once, else this is `graph_invalid` (`spec.md` §4.H). Appends the
    /// recorded recipe to `trace`, then each destination's sub-trace in
    /// call order.
    pub(crate) fn finish(self, graph: GraphId, trace: &mut Trace) -> Result<()> {
        if self.edges.iter().any(Option::is_some) {
            return Err(Error::new(ErrorCode::GraphInvalid, "function graph left an edge unterminated"));
        }
        trace.push(TraceEntry::Function { graph, ops: self.ops });
        for sub in self.destinations {
            trace.extend_from(sub);
        }
        Ok(())
    }
}

/// How an N-ary clustering graph partitions its inputs into groups
/// before feeding each group's concatenation to a successor
/// (`spec.md` §4.K).
pub trait ClusteringStrategy {
    /// Partition `inputs` (given by index) into groups, each naming the
    /// concat codec and successor that consumes that group's
    /// concatenation (`spec.md` §4.K). Typically backed by a
    /// [`crate::cluster::ClusterConfig`], but a caller may implement this
    /// directly for ad hoc grouping.
    fn cluster(&self, inputs: &[vex_core::stream::TypedStream]) -> Vec<crate::cluster::ClusterGroupPlan>;
}

/// The four ways a graph may pick its successor (`spec.md` §3.2, §4.F-K).
pub enum GraphKind {
    /// A single, statically-declared successor.
    Static(Successor),
    /// One of several statically-declared candidates, chosen dynamically.
    Selector {
        /// The candidate successors.
        candidates: Vec<Successor>,
        /// The selection function.
        selector: Box<dyn Selector>,
    },
    /// A successor built entirely in code from the input.
    Function(Box<dyn FunctionGraph>),
    /// An N-ary partition of inputs into groups, each routed onward.
    Cluster(Box<dyn ClusteringStrategy>),
}

/// A registered graph: its identity, accepted input types, and wiring.
pub struct GraphDescriptor {
    id: GraphId,
    name: String,
    input_mask: TypeMask,
    kind: GraphKind,
}

impl GraphDescriptor {
    /// Construct a new graph descriptor.
    pub fn new(id: GraphId, name: impl Into<String>, input_mask: TypeMask, kind: GraphKind) -> Self {
        Self {
            id,
            name: name.into(),
            input_mask,
            kind,
        }
    }

    /// This graph's stable identifier.
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// This graph's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type mask this graph's input must satisfy.
    pub fn input_mask(&self) -> TypeMask {
        self.input_mask
    }

    /// This graph's wiring kind.
    pub fn kind(&self) -> &GraphKind {
        &self.kind
    }

    /// Whether this is a clustering graph (operates on N inputs, not 1).
    pub fn is_cluster(&self) -> bool {
        matches!(self.kind, GraphKind::Cluster(_))
    }
}
