//! Cycle detection over the composition graph.
//!
//! Uses Tarjan's strongly-connected-components algorithm with an explicit
//! recursion stack, so graph depth is bounded by heap rather than call-stack
//! size. A component with more than one member is a cycle; a single node is
//! a cycle only if it depends on itself. Overlapping cycles always end up in
//! the same component.

use std::collections::BTreeSet;

use crate::error::CompositionError;
use crate::graph::{CompositionGraph, NodeId};

/// Per-node bookkeeping for Tarjan's algorithm.
#[derive(Clone, Copy)]
struct Visit {
    index: usize,
    lowlink: usize,
    on_stack: bool,
}

/// Returns every cycle in `graph`, one set per strongly-connected component.
///
/// Components are sorted by their smallest node id so the result is stable.
#[must_use]
pub fn find_cycles(graph: &CompositionGraph) -> Vec<BTreeSet<NodeId>> {
    let mut visits: Vec<Option<Visit>> = vec![None; graph.len()];
    let mut stack: Vec<NodeId> = Vec::new();
    // (node, position of the next dependency to explore)
    let mut frames: Vec<(NodeId, usize)> = Vec::new();
    let mut next_index = 0;
    let mut cycles = Vec::new();

    for root in graph.node_ids() {
        if visits[root.index()].is_some() {
            continue;
        }
        enter(root, &mut visits, &mut stack, &mut frames, &mut next_index);

        while let Some(&(node, cursor)) = frames.last() {
            if let Some(&child) = graph.dependencies_of(node).get(cursor) {
                let top = frames.len() - 1;
                frames[top].1 += 1;

                match visits[child.index()] {
                    None => enter(child, &mut visits, &mut stack, &mut frames, &mut next_index),
                    Some(seen) if seen.on_stack => lower(&mut visits, node, seen.index),
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            let Some(visit) = visits[node.index()] else {
                continue;
            };
            if let Some(&(parent, _)) = frames.last() {
                lower(&mut visits, parent, visit.lowlink);
            }
            if visit.lowlink != visit.index {
                continue;
            }

            let mut component = BTreeSet::new();
            while let Some(member) = stack.pop() {
                if let Some(v) = visits[member.index()].as_mut() {
                    v.on_stack = false;
                }
                component.insert(member);
                if member == node {
                    break;
                }
            }
            if component.len() > 1 || graph.has_self_edge(node) {
                cycles.push(component);
            }
        }
    }

    cycles.sort();
    cycles
}

/// Fails if `graph` contains any cycle.
///
/// # Errors
///
/// Returns [`CompositionError::CyclicGraph`] naming the union of every
/// implementation taking part in a cycle.
pub fn check_acyclic(graph: &CompositionGraph) -> Result<(), CompositionError> {
    let cycles = find_cycles(graph);
    if cycles.is_empty() {
        return Ok(());
    }
    Err(CompositionError::CyclicGraph {
        nodes: graph.implementations(cycles.into_iter().flatten()),
    })
}

fn enter(
    node: NodeId,
    visits: &mut [Option<Visit>],
    stack: &mut Vec<NodeId>,
    frames: &mut Vec<(NodeId, usize)>,
    next_index: &mut usize,
) {
    visits[node.index()] = Some(Visit {
        index: *next_index,
        lowlink: *next_index,
        on_stack: true,
    });
    *next_index += 1;
    stack.push(node);
    frames.push((node, 0));
}

fn lower(visits: &mut [Option<Visit>], node: NodeId, candidate: usize) {
    if let Some(v) = visits[node.index()].as_mut() {
        v.lowlink = v.lowlink.min(candidate);
    }
}
