//! Compress-side execution: a pre-order depth-first walk appending trace
//! entries as it goes (`spec.md` §4.F).

use vex_core::error::{Error, ErrorCode, GraphContext, Result, ScopeStack};
use vex_core::stream::TypedStream;

use crate::cluster::merge_group;
use crate::graph::{GraphId, GraphKind, SelectorContext, Successor};
use crate::node::{NodeId, NodeKind};
use crate::registry::Registry;
use crate::trace::{StreamShape, Trace, TraceEntry};

/// Run `graph_id` over `inputs`, appending to `trace` and `payloads`.
/// Every graph but [`GraphKind::Cluster`] expects exactly one input
/// stream; `Cluster` graphs consume an arbitrary N.
pub fn compress_graph(
    registry: &Registry,
    graph_id: GraphId,
    inputs: &[TypedStream],
    trace: &mut Trace,
    payloads: &mut Vec<u8>,
) -> Result<()> {
    let _scope = ScopeStack::enter(GraphContext {
        graph_id: Some(graph_id.0),
        ..Default::default()
    });
    let graph = registry.graph(graph_id)?;
    if !graph.is_cluster() && inputs.len() != 1 {
        return Err(logic_invalid(graph_id, inputs.len()));
    }

    match graph.kind() {
        GraphKind::Static(successor) => run_successor(registry, successor, &inputs[0], trace, payloads),
        GraphKind::Selector { candidates, selector } => {
            let ctx = SelectorContext::new(registry);
            let choice = selector.select(&ctx, &inputs[0], candidates);
            let successor = candidates.get(choice).ok_or_else(|| {
                Error::new(ErrorCode::GraphInvalid, "selector returned an out-of-range candidate index")
            })?;
            run_successor(registry, successor, &inputs[0], trace, payloads)
        }
        GraphKind::Function(function) => {
            let mut ctx = crate::graph::FunctionGraphContext::new(registry, payloads);
            let root = ctx.new_edge(inputs[0].clone());
            function.build(&mut ctx, root)?;
            ctx.finish(graph_id, trace)
        }
        GraphKind::Cluster(strategy) => {
            let grouping = strategy.cluster(inputs);
            let mut groups = Vec::with_capacity(grouping.len());
            let mut merged_streams = Vec::with_capacity(grouping.len());
            for plan in &grouping {
                let refs: Vec<&TypedStream> = plan.indices.iter().map(|&i| &inputs[i]).collect();
                let (merged, group) = merge_group(&plan.indices, &refs, plan.codec, plan.width)?;
                groups.push(group);
                merged_streams.push((merged, plan.successor.clone()));
            }
            trace.push(TraceEntry::ClusterSplit { graph: graph_id, groups });
            for (merged, successor) in merged_streams {
                run_successor(registry, &successor, &merged, trace, payloads)?;
            }
            Ok(())
        }
    }
}

fn run_successor(
    registry: &Registry,
    successor: &Successor,
    input: &TypedStream,
    trace: &mut Trace,
    payloads: &mut Vec<u8>,
) -> Result<()> {
    run_node(registry, successor.node, input, &successor.next, trace, payloads)
}

fn run_node(
    registry: &Registry,
    node_id: NodeId,
    input: &TypedStream,
    next: &[GraphId],
    trace: &mut Trace,
    payloads: &mut Vec<u8>,
) -> Result<()> {
    let _scope = ScopeStack::enter(GraphContext {
        node_id: Some(node_id.0),
        ..Default::default()
    });
    let node = registry.node(node_id)?;
    let params = node.local_params().clone();
    match node.kind() {
        NodeKind::Leaf(leaf) => {
            let (header, payload) = leaf.encode(std::slice::from_ref(input), &params)?;
            let payload_offset = payloads.len();
            let payload_len = payload.len();
            payloads.extend_from_slice(&payload);
            trace.push(TraceEntry::Leaf {
                node: node_id,
                shape: StreamShape::of(input),
                header,
                payload_offset,
                payload_len,
            });
            Ok(())
        }
        NodeKind::Transform(transform) => {
            let outputs = transform.encode(std::slice::from_ref(input), &params)?;
            trace.push(TraceEntry::Transform {
                node: node_id,
                num_outputs: outputs.len(),
            });
            for (output, &graph_id) in outputs.iter().zip(next) {
                compress_graph(registry, graph_id, std::slice::from_ref(output), trace, payloads)?;
            }
            Ok(())
        }
    }
}

fn logic_invalid(graph_id: GraphId, got: usize) -> Error {
    Error::new(
        ErrorCode::GraphInvalid,
        format!("graph {graph_id:?} expects a single input stream, got {got}"),
    )
}
