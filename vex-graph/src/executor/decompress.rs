//! Decompress-side execution: a reverse scan of the trace, replayed as a
//! stack machine (`spec.md` §4.F). Each entry pops exactly the number of
//! items its forward-side arity produced and pushes back whatever it
//! reconstructs; no explicit tree is ever built.

use std::collections::HashMap;

use vex_core::error::{logic_error, Error, ErrorCode, GraphContext, Result, ScopeStack};
use vex_core::stream::TypedStream;

use crate::cluster::{concat_streams, split_group};
use crate::node::NodeKind;
use crate::registry::Registry;
use crate::trace::{FunctionOp, TraceEntry};

/// Replay `trace`'s entries in reverse, reconstructing every original
/// top-level input stream the compress-side walk started from.
///
/// Returns the reconstructed streams keyed by their position among the
/// compressor's original inputs (for the common single-stream case, this
/// is always a one-element vector at index 0).
pub fn decompress_trace(registry: &Registry, trace: &crate::trace::Trace, payloads: &[u8]) -> Result<Vec<TypedStream>> {
    let mut stack: Vec<TypedStream> = Vec::new();
    // Original-index -> reconstructed stream, populated only by
    // ClusterSplit entries; merged back into `stack`-order results at
    // the end if any cluster ran.
    let mut by_original_index: std::collections::BTreeMap<usize, TypedStream> = std::collections::BTreeMap::new();
    let mut saw_cluster = false;

    for entry in trace.entries().iter().rev() {
        match entry {
            TraceEntry::Leaf {
                node,
                shape,
                header,
                payload_offset,
                payload_len,
            } => {
                let _scope = ScopeStack::enter(GraphContext {
                    node_id: Some(node.0),
                    ..Default::default()
                });
                let descriptor = registry.node(*node)?;
                let NodeKind::Leaf(leaf) = descriptor.kind() else {
                    return Err(logic_error("trace Leaf entry names a non-leaf node"));
                };
                let end = payload_offset
                    .checked_add(*payload_len)
                    .filter(|&e| e <= payloads.len())
                    .ok_or_else(|| Error::new(ErrorCode::Corruption, "leaf payload range out of bounds"))?;
                let payload = &payloads[*payload_offset..end];
                let params = descriptor.local_params().clone();
                let mut reconstructed = leaf.decode(header, payload, std::slice::from_ref(shape), &params)?;
                if reconstructed.len() != 1 {
                    return Err(logic_error("leaf decode must reconstruct exactly one stream"));
                }
                stack.push(reconstructed.remove(0));
            }
            TraceEntry::Transform { node, num_outputs } => {
                let _scope = ScopeStack::enter(GraphContext {
                    node_id: Some(node.0),
                    ..Default::default()
                });
                if stack.len() < *num_outputs {
                    return Err(Error::new(ErrorCode::Corruption, "trace underflows the replay stack"));
                }
                let mut outputs = Vec::with_capacity(*num_outputs);
                for _ in 0..*num_outputs {
                    outputs.push(stack.pop().unwrap());
                }
                let descriptor = registry.node(*node)?;
                let NodeKind::Transform(transform) = descriptor.kind() else {
                    return Err(logic_error("trace Transform entry names a non-transform node"));
                };
                let params = descriptor.local_params().clone();
                let mut reconstructed = transform.decode(&outputs, &params)?;
                if reconstructed.len() != 1 {
                    return Err(logic_error("transform decode must reconstruct exactly one stream"));
                }
                stack.push(reconstructed.remove(0));
            }
            TraceEntry::ClusterSplit { graph, groups } => {
                let _scope = ScopeStack::enter(GraphContext {
                    graph_id: Some(graph.0),
                    ..Default::default()
                });
                saw_cluster = true;
                if stack.len() < groups.len() {
                    return Err(Error::new(ErrorCode::Corruption, "cluster split underflows the replay stack"));
                }
                // Groups were pushed in forward (group-index) order by
                // their successor subtrees, so the last group's result is
                // on top; pop group-by-group from the end.
                for group in groups.iter().rev() {
                    let merged = stack.pop().unwrap();
                    for (original_index, stream) in split_group(&merged, group)? {
                        by_original_index.insert(original_index, stream);
                    }
                }
            }
            TraceEntry::Function { graph, ops } => {
                let _scope = ScopeStack::enter(GraphContext {
                    graph_id: Some(graph.0),
                    ..Default::default()
                });
                let destinations: Vec<usize> = ops
                    .iter()
                    .filter_map(|op| match op {
                        FunctionOp::SetDestination { edge } => Some(*edge),
                        _ => None,
                    })
                    .collect();
                if stack.len() < destinations.len() {
                    return Err(Error::new(ErrorCode::Corruption, "function graph underflows the replay stack"));
                }
                let mut resolved: HashMap<usize, TypedStream> = HashMap::new();
                for &edge in destinations.iter().rev() {
                    resolved.insert(edge, stack.pop().unwrap());
                }
                for op in ops.iter().rev() {
                    match op {
                        FunctionOp::SetDestination { .. } => {}
                        FunctionOp::RunSplit { edge, outputs, ty, width, .. } => {
                            let children: Vec<&TypedStream> = outputs
                                .iter()
                                .map(|o| {
                                    resolved
                                        .get(o)
                                        .ok_or_else(|| logic_error("function graph: split output edge unresolved"))
                                })
                                .collect::<Result<_>>()?;
                            let merged = concat_streams(*ty, *width, &children)?;
                            resolved.insert(*edge, merged);
                        }
                        FunctionOp::RunTransform { node, edge, outputs } => {
                            let descriptor = registry.node(*node)?;
                            let NodeKind::Transform(transform) = descriptor.kind() else {
                                return Err(logic_error("function graph trace names a non-transform node"));
                            };
                            let children: Vec<TypedStream> = outputs
                                .iter()
                                .map(|o| {
                                    resolved
                                        .remove(o)
                                        .ok_or_else(|| logic_error("function graph: transform output edge unresolved"))
                                })
                                .collect::<Result<_>>()?;
                            let params = descriptor.local_params().clone();
                            let mut reconstructed = transform.decode(&children, &params)?;
                            if reconstructed.len() != 1 {
                                return Err(logic_error("function graph transform decode must reconstruct exactly one stream"));
                            }
                            resolved.insert(*edge, reconstructed.remove(0));
                        }
                        FunctionOp::RunLeaf {
                            node,
                            edge,
                            shape,
                            header,
                            payload_offset,
                            payload_len,
                        } => {
                            let descriptor = registry.node(*node)?;
                            let NodeKind::Leaf(leaf) = descriptor.kind() else {
                                return Err(logic_error("function graph trace names a non-leaf node"));
                            };
                            let end = payload_offset
                                .checked_add(*payload_len)
                                .filter(|&e| e <= payloads.len())
                                .ok_or_else(|| Error::new(ErrorCode::Corruption, "function graph leaf payload range out of bounds"))?;
                            let payload = &payloads[*payload_offset..end];
                            let params = descriptor.local_params().clone();
                            let mut reconstructed = leaf.decode(header, payload, std::slice::from_ref(shape), &params)?;
                            if reconstructed.len() != 1 {
                                return Err(logic_error("function graph leaf decode must reconstruct exactly one stream"));
                            }
                            resolved.insert(*edge, reconstructed.remove(0));
                        }
                    }
                }
                let root = resolved
                    .remove(&0)
                    .ok_or_else(|| logic_error("function graph trace did not resolve its root edge"))?;
                stack.push(root);
            }
        }
    }

    if saw_cluster {
        Ok(by_original_index.into_values().collect())
    } else {
        stack.reverse();
        Ok(stack)
    }
}
