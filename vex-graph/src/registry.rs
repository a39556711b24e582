//! The node/graph registry: owns every registered [`NodeDescriptor`] and
//! [`GraphDescriptor`] and validates wiring between them (`spec.md` §4.F).

use std::collections::{HashMap, HashSet};

use vex_core::error::{Error, ErrorCode, Result};

use crate::graph::{GraphDescriptor, GraphId, GraphKind, Successor};
use crate::node::{NodeDescriptor, NodeId, NodeParams};

/// Owns the full set of nodes and graphs a compressor may reference, and
/// validates that successor wiring is type-compatible before it is ever
/// run (`spec.md` §4.F "graph validation").
///
/// Names are UTF-8 and unique within a registry, separately for nodes and
/// for graphs (they live in separate id spaces already); a name collision
/// from [`Registry::clone_node`] or [`Registry::register_parameterized_graph`]
/// is disambiguated with a `#N` suffix rather than rejected (`spec.md` §4.E).
#[derive(Default)]
pub struct Registry {
    nodes: HashMap<NodeId, NodeDescriptor>,
    graphs: HashMap<GraphId, GraphDescriptor>,
    node_names: HashSet<String>,
    graph_names: HashSet<String>,
    next_node_id: u32,
    next_graph_id: u32,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, returning an error if its id or its name is
    /// already taken.
    pub fn register_node(&mut self, node: NodeDescriptor) -> Result<()> {
        if self.nodes.contains_key(&node.id()) {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("node id {:?} already registered", node.id()),
            ));
        }
        if self.node_names.contains(node.name()) {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("node name {:?} already registered", node.name()),
            ));
        }
        self.next_node_id = self.next_node_id.max(node.id().0.wrapping_add(1));
        self.node_names.insert(node.name().to_string());
        self.nodes.insert(node.id(), node);
        Ok(())
    }

    /// Register a graph, returning an error if its id or its name is
    /// already taken.
    pub fn register_graph(&mut self, graph: GraphDescriptor) -> Result<()> {
        if self.graphs.contains_key(&graph.id()) {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("graph id {:?} already registered", graph.id()),
            ));
        }
        if self.graph_names.contains(graph.name()) {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("graph name {:?} already registered", graph.name()),
            ));
        }
        self.next_graph_id = self.next_graph_id.max(graph.id().0.wrapping_add(1));
        self.graph_names.insert(graph.name().to_string());
        self.graphs.insert(graph.id(), graph);
        Ok(())
    }

    /// Disambiguate `base_name` against `taken`: if it is free, use it
    /// unchanged; otherwise append `#2`, `#3`, ... until a free name is
    /// found (`spec.md` §4.E, §9 persisted-state clone naming).
    fn disambiguate(base_name: &str, taken: &HashSet<String>) -> String {
        if !taken.contains(base_name) {
            return base_name.to_string();
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base_name}#{n}");
            if !taken.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Clone a registered node under a fresh id, baking in `local_params`
    /// in place of the original's (`spec.md` §3.2 "clone_node"). The
    /// clone shares the original's kernel implementation and shape
    /// contract; its name is the original's, `#N`-disambiguated.
    pub fn clone_node(&mut self, base: NodeId, local_params: NodeParams) -> Result<NodeId> {
        let base = self.node(base)?;
        let name = Self::disambiguate(base.name(), &self.node_names);
        let new_id = NodeId(self.next_node_id);
        let cloned = NodeDescriptor::new(
            new_id,
            name,
            base.num_inputs(),
            base.input_mask(),
            base.output_types().to_vec(),
            base.min_format_version(),
            base.share_kind(),
        )
        .with_local_params(local_params);
        self.register_node(cloned)?;
        Ok(new_id)
    }

    /// Register a new graph derived from `base`'s wiring, with the first
    /// `custom_graphs.len()` of its successor-graph targets overridden (in
    /// declaration order) and `local_params` baked into a clone of the
    /// node it runs (`spec.md` §3.2 "register_parameterized_graph"). Only
    /// [`GraphKind::Static`] bases are supported: a selector's or
    /// function-graph's wiring is computed by its callback, not declared,
    /// so there is nothing positional to override.
    pub fn register_parameterized_graph(
        &mut self,
        base: GraphId,
        custom_graphs: &[GraphId],
        local_params: NodeParams,
    ) -> Result<GraphId> {
        let base_graph = self.graph(base)?;
        let GraphKind::Static(successor) = base_graph.kind() else {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                "register_parameterized_graph requires a Static base graph",
            ));
        };
        let base_node = successor.node;
        let mut next = successor.next.clone();
        for (slot, &override_graph) in next.iter_mut().zip(custom_graphs) {
            *slot = override_graph;
        }
        let input_mask = base_graph.input_mask();
        let name = Self::disambiguate(base_graph.name(), &self.graph_names);

        let cloned_node = self.clone_node(base_node, local_params)?;
        let new_id = GraphId(self.next_graph_id);
        let descriptor = GraphDescriptor::new(
            new_id,
            name,
            input_mask,
            GraphKind::Static(Successor { node: cloned_node, next }),
        );
        self.register_graph(descriptor)?;
        Ok(new_id)
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Result<&NodeDescriptor> {
        self.nodes
            .get(&id)
            .ok_or_else(|| Error::new(ErrorCode::GraphInvalid, format!("unknown node id {id:?}")))
    }

    /// Look up a graph by id.
    pub fn graph(&self, id: GraphId) -> Result<&GraphDescriptor> {
        self.graphs
            .get(&id)
            .ok_or_else(|| Error::new(ErrorCode::GraphInvalid, format!("unknown graph id {id:?}")))
    }

    /// Validate that `entry` is well-formed: the graph exists, its input
    /// mask is satisfiable, and every successor it can statically name
    /// routes into a node whose input mask accepts what that node's
    /// declared outputs would produce, transitively. Run once per graph
    /// reachable from the compressor's root before any data is processed
    /// (`spec.md` §4.F).
    pub fn validate_graph(&self, id: GraphId, format_version: u16) -> Result<()> {
        let graph = self.graph(id)?;
        match graph.kind() {
            GraphKind::Static(successor) => self.validate_successor(successor, format_version),
            GraphKind::Selector { candidates, .. } => {
                for c in candidates {
                    self.validate_successor(c, format_version)?;
                }
                Ok(())
            }
            // Function and Cluster graphs build their wiring dynamically
            // from live data; only their leaf/transform targets that are
            // statically nameable (none, by construction) would be
            // checked here. Nothing further to validate structurally.
            GraphKind::Function(_) | GraphKind::Cluster(_) => Ok(()),
        }
    }

    fn validate_successor(&self, successor: &Successor, format_version: u16) -> Result<()> {
        let node = self.node(successor.node)?;
        if node.min_format_version() > format_version {
            return Err(Error::new(
                ErrorCode::FormatVersionUnsupported,
                format!(
                    "node {:?} requires format version >= {}, negotiated {}",
                    node.id(),
                    node.min_format_version(),
                    format_version
                ),
            ));
        }
        vex_core::wire::limits::ResourceLimits::for_version(format_version).check_node_outputs(node.num_outputs())?;
        if successor.next.len() != node.num_outputs() {
            return Err(Error::new(
                ErrorCode::GraphInvalid,
                format!(
                    "node {:?} declares {} outputs but wiring names {} successors",
                    node.id(),
                    node.num_outputs(),
                    successor.next.len()
                ),
            ));
        }
        for (port, &next_graph_id) in successor.next.iter().enumerate() {
            let next_graph = self.graph(next_graph_id)?;
            let produced = node.output_types()[port];
            if !next_graph.input_mask().accepts(produced) {
                return Err(Error::new(
                    ErrorCode::GraphInvalid,
                    format!(
                        "node {:?} output port {port} produces {produced:?}, \
                         which graph {next_graph_id:?} does not accept",
                        node.id()
                    ),
                ));
            }
            self.validate_graph(next_graph_id, format_version)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{LeafKernel, NodeKind};
    use std::rc::Rc;
    use vex_core::error::Result as VResult;
    use vex_core::stream::{StreamType, TypedStream};

    struct DummyLeaf;
    impl LeafKernel for DummyLeaf {
        fn encode(&self, _inputs: &[TypedStream], _params: &crate::node::NodeParams) -> VResult<(Vec<u8>, Vec<u8>)> {
            Ok((vec![], vec![]))
        }
        fn decode(
            &self,
            _header: &[u8],
            _payload: &[u8],
            _shapes: &[crate::trace::StreamShape],
            _params: &crate::node::NodeParams,
        ) -> VResult<Vec<TypedStream>> {
            Ok(vec![])
        }
    }

    #[test]
    fn unknown_node_is_rejected() {
        let registry = Registry::new();
        assert!(registry.node(NodeId(0)).is_err());
    }

    #[test]
    fn static_graph_validates_when_types_match() {
        let mut registry = Registry::new();
        let leaf = NodeDescriptor::new(
            NodeId(1),
            "store",
            1,
            TypeMaskAll::any(),
            vec![],
            1,
            NodeKind::Leaf(Rc::new(DummyLeaf)),
        );
        registry.register_node(leaf).unwrap();
        let graph = GraphDescriptor::new(
            GraphId(1),
            "store_graph",
            TypeMaskAll::any(),
            GraphKind::Static(Successor {
                node: NodeId(1),
                next: vec![],
            }),
        );
        registry.register_graph(graph).unwrap();
        assert!(registry.validate_graph(GraphId(1), 1).is_ok());
    }

    struct TypeMaskAll;
    impl TypeMaskAll {
        fn any() -> vex_core::stream::TypeMask {
            vex_core::stream::TypeMask::all()
        }
    }

    fn leaf_node(id: u32, name: &str) -> NodeDescriptor {
        NodeDescriptor::new(NodeId(id), name, 1, TypeMaskAll::any(), vec![], 1, NodeKind::Leaf(Rc::new(DummyLeaf)))
    }

    #[test]
    fn duplicate_node_name_is_rejected_even_with_a_fresh_id() {
        let mut registry = Registry::new();
        registry.register_node(leaf_node(1, "store")).unwrap();
        let err = registry.register_node(leaf_node(2, "store")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn clone_node_gets_a_fresh_id_and_a_disambiguated_name() {
        let mut registry = Registry::new();
        registry.register_node(leaf_node(1, "store")).unwrap();

        let mut params = NodeParams::new();
        params.set(1, 42);
        let cloned = registry.clone_node(NodeId(1), params.clone()).unwrap();

        assert_ne!(cloned, NodeId(1));
        assert_eq!(registry.node(cloned).unwrap().name(), "store#2");
        assert_eq!(registry.node(cloned).unwrap().local_params().get(1), Some(42));
        // The original is untouched.
        assert_eq!(registry.node(NodeId(1)).unwrap().local_params().get(1), None);
    }

    #[test]
    fn cloning_twice_skips_to_the_next_free_suffix() {
        let mut registry = Registry::new();
        registry.register_node(leaf_node(1, "store")).unwrap();
        registry.clone_node(NodeId(1), NodeParams::new()).unwrap();
        let second = registry.clone_node(NodeId(1), NodeParams::new()).unwrap();
        assert_eq!(registry.node(second).unwrap().name(), "store#3");
    }

    #[test]
    fn register_parameterized_graph_overrides_successors_and_bakes_params() {
        let mut registry = Registry::new();
        registry.register_node(leaf_node(1, "store")).unwrap();
        registry
            .register_graph(GraphDescriptor::new(
                GraphId(1),
                "target_a",
                TypeMaskAll::any(),
                GraphKind::Static(Successor { node: NodeId(1), next: vec![] }),
            ))
            .unwrap();
        registry
            .register_graph(GraphDescriptor::new(
                GraphId(2),
                "base_graph",
                TypeMaskAll::any(),
                GraphKind::Static(Successor { node: NodeId(1), next: vec![] }),
            ))
            .unwrap();

        let mut params = NodeParams::new();
        params.set(9, 7);
        let parameterized = registry.register_parameterized_graph(GraphId(2), &[], params).unwrap();

        let graph = registry.graph(parameterized).unwrap();
        assert_eq!(graph.name(), "base_graph#2");
        let GraphKind::Static(successor) = graph.kind() else {
            panic!("expected a Static graph");
        };
        assert_ne!(successor.node, NodeId(1));
        assert_eq!(registry.node(successor.node).unwrap().local_params().get(9), Some(7));
    }

    #[test]
    fn register_parameterized_graph_rejects_a_selector_base() {
        struct AlwaysFirst;
        impl crate::graph::Selector for AlwaysFirst {
            fn select(
                &self,
                _ctx: &crate::graph::SelectorContext,
                _input: &TypedStream,
                _candidates: &[Successor],
            ) -> usize {
                0
            }
        }

        let mut registry = Registry::new();
        registry.register_node(leaf_node(1, "store")).unwrap();
        registry
            .register_graph(GraphDescriptor::new(
                GraphId(1),
                "selector_graph",
                TypeMaskAll::any(),
                GraphKind::Selector {
                    candidates: vec![Successor { node: NodeId(1), next: vec![] }],
                    selector: Box::new(AlwaysFirst),
                },
            ))
            .unwrap();

        let err = registry
            .register_parameterized_graph(GraphId(1), &[], NodeParams::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }
}
