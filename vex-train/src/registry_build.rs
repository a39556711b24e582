//! Turns an [`crate::individual::Individual`] gene into a real
//! `vex_graph::Registry` plus its root `GraphId`, so ACE can actually run
//! a candidate through the ordinary compress/decompress path rather than
//! simulating it.

use std::rc::Rc;

use vex_core::stream::{StreamType, TypeMask};
use vex_graph::codecs::{delta::Delta, rangepack::RangePack, store::Store, zigzag::Zigzag};
use vex_graph::graph::{GraphDescriptor, GraphId, GraphKind, Successor};
use vex_graph::node::{NodeDescriptor, NodeId, NodeKind};
use vex_graph::registry::Registry;

use crate::individual::{Individual, Leaf, Op};

/// Registers every component of `tree` into a fresh registry and returns
/// it alongside the root graph a [`vex_graph::compressor::Compressor`]
/// should be driven against. Node/graph ids are assigned sequentially
/// from the leaf outward; they have no meaning beyond this one registry.
pub fn build_registry(tree: &Individual) -> (Registry, GraphId) {
    let mut registry = Registry::new();
    let mut next_id = 1u32;
    let root = add_subtree(tree, &mut registry, &mut next_id);
    (registry, root)
}

fn add_subtree(tree: &Individual, registry: &mut Registry, next_id: &mut u32) -> GraphId {
    match tree {
        Individual::Leaf { leaf } => {
            let id = *next_id;
            *next_id += 1;
            let (mask, kind): (TypeMask, NodeKind) = match leaf {
                Leaf::Store => (TypeMask::all(), NodeKind::Leaf(Rc::new(Store))),
                Leaf::RangePack => (TypeMask::NUMERIC, NodeKind::Leaf(Rc::new(RangePack))),
            };
            let name = format!("{}_{id}", leaf_name(*leaf));
            registry
                .register_node(NodeDescriptor::new(NodeId(id), name.clone(), 1, mask, vec![], 1, kind))
                .expect("fresh sequential node id and name");
            registry
                .register_graph(GraphDescriptor::new(
                    GraphId(id),
                    name,
                    mask,
                    GraphKind::Static(Successor {
                        node: NodeId(id),
                        next: vec![],
                    }),
                ))
                .expect("fresh sequential graph id");
            GraphId(id)
        }
        Individual::Transform { op, child } => {
            let child_graph = add_subtree(child, registry, next_id);
            let id = *next_id;
            *next_id += 1;
            let kind: NodeKind = match op {
                Op::Delta => NodeKind::Transform(Rc::new(Delta)),
                Op::Zigzag => NodeKind::Transform(Rc::new(Zigzag)),
            };
            let name = format!("{}_{id}", op_name(*op));
            registry
                .register_node(NodeDescriptor::new(
                    NodeId(id),
                    name.clone(),
                    1,
                    TypeMask::NUMERIC,
                    vec![StreamType::Numeric],
                    1,
                    kind,
                ))
                .expect("fresh sequential node id and name");
            registry
                .register_graph(GraphDescriptor::new(
                    GraphId(id),
                    name,
                    TypeMask::NUMERIC,
                    GraphKind::Static(Successor {
                        node: NodeId(id),
                        next: vec![child_graph],
                    }),
                ))
                .expect("fresh sequential graph id");
            GraphId(id)
        }
    }
}

fn op_name(op: Op) -> &'static str {
    match op {
        Op::Delta => "delta",
        Op::Zigzag => "zigzag",
    }
}

fn leaf_name(leaf: Leaf) -> &'static str {
    match leaf {
        Leaf::Store => "store",
        Leaf::RangePack => "rangepack",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::random_tree;
    use vex_core::stream::TypedStream;
    use vex_graph::compressor::Compressor;
    use vex_graph::params::Parameters;

    #[test]
    fn every_gene_builds_a_validating_registry() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let tree = random_tree(&mut rng, 3);
            let (registry, root) = build_registry(&tree);
            let params = Parameters::new().with_format_version(1).unwrap();
            let compressor = Compressor::new(registry, params);
            assert!(compressor.validate(root).is_ok(), "gene {tree:?} failed to validate");
        }
    }

    #[test]
    fn store_leaf_round_trips_a_numeric_stream() {
        let (registry, root) = build_registry(&Individual::leaf(Leaf::Store));
        let params = Parameters::new().with_format_version(1).unwrap();
        let compressor = Compressor::new(registry, params);

        let s = TypedStream::create(StreamType::Numeric, 8).unwrap();
        s.reserve(3).unwrap();
        for v in [1i64, 2, 3] {
            s.write_bytes(&v.to_le_bytes()).unwrap();
        }
        s.commit(3).unwrap();

        let bytes = compressor.compress(root, s.clone()).unwrap();
        let decoded = compressor.decompress(&bytes).unwrap();
        decoded.with_bytes(|got| s.with_bytes(|orig| assert_eq!(got, orig)));
    }
}
