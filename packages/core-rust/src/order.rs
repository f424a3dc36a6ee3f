//! Initialization order resolution.
//!
//! Kahn's algorithm over a [`ValidatedGraph`]: a node becomes eligible once
//! every node it depends on is placed. When several nodes are eligible at
//! once, the one registered first goes first, which makes the plan (and the
//! reversed teardown order) reproducible for identical registrations.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::graph::{CompositionGraph, NodeId, ServiceNode};
use crate::ids::{ContractId, ImplementationId};
use crate::validate::ValidatedGraph;

// ---------------------------------------------------------------------------
// InitializationPlan
// ---------------------------------------------------------------------------

/// Construction order for a validated graph.
///
/// For every edge `dependent -> dependency`, the dependency is placed
/// strictly before the dependent. The plan owns its graph.
#[derive(Debug, Clone)]
pub struct InitializationPlan {
    graph: CompositionGraph,
    roots: Vec<ContractId>,
    order: Vec<NodeId>,
    /// Node index -> position in `order`.
    positions: Vec<usize>,
}

impl InitializationPlan {
    /// Node ids in construction order.
    #[must_use]
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in construction order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ServiceNode> + '_ {
        self.order.iter().map(|&id| self.graph.node(id))
    }

    /// Nodes in teardown order (construction order reversed).
    pub fn teardown(&self) -> impl Iterator<Item = &ServiceNode> + '_ {
        self.iter().rev()
    }

    /// Position of `id` in construction order.
    #[must_use]
    pub fn position(&self, id: NodeId) -> usize {
        self.positions[id.index()]
    }

    #[must_use]
    pub fn position_of(&self, implementation: ImplementationId) -> Option<usize> {
        self.graph.find(implementation).map(|id| self.position(id))
    }

    /// Implementation identities in construction order.
    #[must_use]
    pub fn implementations(&self) -> Vec<ImplementationId> {
        self.iter().map(ServiceNode::implementation).collect()
    }

    #[must_use]
    pub fn graph(&self) -> &CompositionGraph {
        &self.graph
    }

    /// Root contracts the plan was validated against.
    #[must_use]
    pub fn roots(&self) -> &[ContractId] {
        &self.roots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ---------------------------------------------------------------------------
// resolve_order
// ---------------------------------------------------------------------------

/// Produces the deterministic construction order for `validated`.
#[must_use]
pub fn resolve_order(validated: ValidatedGraph) -> InitializationPlan {
    let (graph, roots) = validated.into_parts();

    let mut remaining: Vec<usize> = graph
        .node_ids()
        .map(|id| graph.dependencies_of(id).len())
        .collect();
    let mut eligible: BinaryHeap<Reverse<NodeId>> = graph
        .node_ids()
        .filter(|id| remaining[id.index()] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    let mut positions = vec![0; graph.len()];

    // NodeId order is registration order, so the min-heap is the tie-break.
    while let Some(Reverse(node)) = eligible.pop() {
        positions[node.index()] = order.len();
        order.push(node);
        for &dependent in graph.dependents_of(node) {
            remaining[dependent.index()] -= 1;
            if remaining[dependent.index()] == 0 {
                eligible.push(Reverse(dependent));
            }
        }
    }
    debug_assert_eq!(order.len(), graph.len(), "validated graph must be acyclic");

    InitializationPlan {
        graph,
        roots,
        order,
        positions,
    }
}
