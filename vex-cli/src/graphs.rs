//! The small named-graph catalog `vex compress --graph <name>` selects
//! from (`SPEC_FULL.md` §6). Every node/graph id here is unique across
//! the *whole* catalog, not just within one named graph, so `vex
//! decompress` can rebuild one shared registry and resolve whichever
//! node ids a frame's trace references without needing to be told which
//! named graph produced it.

use std::rc::Rc;

use vex_core::stream::{StreamType, TypeMask};
use vex_graph::codecs::{delta::Delta, rangepack::RangePack, store::Store, zigzag::Zigzag};
use vex_graph::graph::{GraphDescriptor, GraphId, GraphKind, Successor};
use vex_graph::node::{NodeDescriptor, NodeId, NodeKind};
use vex_graph::registry::Registry;

/// One compressor graph `vex compress` can be pointed at by name.
pub struct NamedGraph {
    /// The name passed to `--graph`.
    pub name: &'static str,
    /// The graph to run as the compressor's root.
    pub root: GraphId,
    /// The stream type this graph's input must be built as.
    pub stream_type: StreamType,
    /// Element width (bytes) `vex compress` chunks the input file into
    /// before handing it to this graph: 1 for the opaque `Serial`
    /// catalog entry, 8 for the little-endian `i64` `Numeric` entries.
    pub width: usize,
}

/// Builds the registry backing every named graph, plus each graph's
/// metadata. Shared by `compress`, `decompress`, and `frame-info`.
pub fn build_catalog() -> (Registry, Vec<NamedGraph>) {
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
        .expect("catalog node ids are unique");
    registry
        .register_graph(GraphDescriptor::new(
            GraphId(1),
            "store",
            TypeMask::all(),
            GraphKind::Static(Successor { node: NodeId(1), next: vec![] }),
        ))
        .expect("catalog graph ids are unique");

    registry
        .register_node(NodeDescriptor::new(
            NodeId(2),
            "rangepack",
            1,
            TypeMask::NUMERIC,
            vec![],
            1,
            NodeKind::Leaf(Rc::new(RangePack)),
        ))
        .expect("catalog node ids are unique");
    registry
        .register_graph(GraphDescriptor::new(
            GraphId(2),
            "rangepack",
            TypeMask::NUMERIC,
            GraphKind::Static(Successor { node: NodeId(2), next: vec![] }),
        ))
        .expect("catalog graph ids are unique");

    registry
        .register_node(NodeDescriptor::new(
            NodeId(3),
            "delta",
            1,
            TypeMask::NUMERIC,
            vec![StreamType::Numeric],
            1,
            NodeKind::Transform(Rc::new(Delta)),
        ))
        .expect("catalog node ids are unique");
    registry
        .register_graph(GraphDescriptor::new(
            GraphId(3),
            "delta-rangepack",
            TypeMask::NUMERIC,
            GraphKind::Static(Successor { node: NodeId(3), next: vec![GraphId(2)] }),
        ))
        .expect("catalog graph ids are unique");

    registry
        .register_node(NodeDescriptor::new(
            NodeId(4),
            "zigzag",
            1,
            TypeMask::NUMERIC,
            vec![StreamType::Numeric],
            1,
            NodeKind::Transform(Rc::new(Zigzag)),
        ))
        .expect("catalog node ids are unique");
    registry
        .register_graph(GraphDescriptor::new(
            GraphId(4),
            "zigzag-rangepack",
            TypeMask::NUMERIC,
            GraphKind::Static(Successor { node: NodeId(4), next: vec![GraphId(2)] }),
        ))
        .expect("catalog graph ids are unique");

    let graphs = vec![
        NamedGraph { name: "store", root: GraphId(1), stream_type: StreamType::Serial, width: 1 },
        NamedGraph { name: "rangepack", root: GraphId(2), stream_type: StreamType::Numeric, width: 8 },
        NamedGraph { name: "delta-rangepack", root: GraphId(3), stream_type: StreamType::Numeric, width: 8 },
        NamedGraph { name: "zigzag-rangepack", root: GraphId(4), stream_type: StreamType::Numeric, width: 8 },
    ];
    (registry, graphs)
}

/// Looks up a named graph's metadata by name.
pub fn find<'a>(graphs: &'a [NamedGraph], name: &str) -> Option<&'a NamedGraph> {
    graphs.iter().find(|g| g.name == name)
}
