//! Composition graph: one node per implementation, one edge per satisfied dependency.
//!
//! Nodes live in an arena indexed by [`NodeId`]; edges are index pairs.
//! Nodes are created in the registry's first-registration order, so a
//! node's index doubles as its registration index.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::error::CompositionError;
use crate::ids::{ContractId, ImplementationId};
use crate::registry::{Dependency, ExportRegistry};

// ---------------------------------------------------------------------------
// NodeId / NodeState
// ---------------------------------------------------------------------------

/// Arena index of a [`ServiceNode`] within its [`CompositionGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle of a node while its plan is executed.
///
/// State machine: `Unresolved -> Resolving -> Resolved`, or
/// `Unresolved -> Resolving -> Failed` when construction raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

// ---------------------------------------------------------------------------
// ServiceNode / DependencyEdge
// ---------------------------------------------------------------------------

/// Graph vertex wrapping one implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNode {
    id: NodeId,
    implementation: ImplementationId,
    exports: Vec<ContractId>,
    dependencies: Vec<Dependency>,
}

impl ServiceNode {
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn implementation(&self) -> ImplementationId {
        self.implementation
    }

    /// Contracts this node satisfies, in registration order.
    #[must_use]
    pub fn exports(&self) -> &[ContractId] {
        &self.exports
    }

    /// Declared dependencies, in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Position of this implementation in registration order.
    #[must_use]
    pub fn registration_index(&self) -> usize {
        self.id.0
    }
}

/// `dependent` needs `dependency` (through `contract`) before it can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DependencyEdge {
    pub dependent: NodeId,
    pub dependency: NodeId,
    pub contract: ContractId,
}

// ---------------------------------------------------------------------------
// CompositionGraph
// ---------------------------------------------------------------------------

/// Nodes and dependency edges built from a registry snapshot.
#[derive(Debug, Clone)]
pub struct CompositionGraph {
    nodes: Vec<ServiceNode>,
    edges: Vec<DependencyEdge>,
    /// Node -> distinct nodes it depends on.
    dependencies: Vec<Vec<NodeId>>,
    /// Node -> distinct nodes depending on it.
    dependents: Vec<Vec<NodeId>>,
    /// Contract -> providing nodes, in binding order.
    providers: HashMap<ContractId, Vec<NodeId>>,
    by_implementation: HashMap<ImplementationId, NodeId>,
}

/// Builds the composition graph for the current registry contents.
///
/// Pure over the registry snapshot: building twice over an unchanged
/// registry yields identical edges.
///
/// # Errors
///
/// Returns [`CompositionError::UnsatisfiedDependency`] when a required
/// dependency has no provider.
pub fn build(registry: &ExportRegistry) -> Result<CompositionGraph, CompositionError> {
    let mut nodes = Vec::with_capacity(registry.implementations().len());
    let mut by_implementation = HashMap::new();

    for (index, implementation) in registry.implementations().iter().enumerate() {
        let id = NodeId(index);
        by_implementation.insert(implementation.id(), id);
        nodes.push(ServiceNode {
            id,
            implementation: implementation.id(),
            exports: registry.exports_of(implementation.id()).collect(),
            dependencies: implementation.dependencies().to_vec(),
        });
    }

    let mut providers: HashMap<ContractId, Vec<NodeId>> = HashMap::new();
    for binding in registry.bindings() {
        providers
            .entry(binding.contract)
            .or_default()
            .push(by_implementation[&binding.implementation]);
    }

    let mut edges = Vec::new();
    let mut dependencies = vec![Vec::new(); nodes.len()];
    let mut dependents = vec![Vec::new(); nodes.len()];

    for node in &nodes {
        for dependency in &node.dependencies {
            let matches = providers
                .get(&dependency.contract)
                .map(Vec::as_slice)
                .unwrap_or_default();

            if matches.is_empty() && !dependency.is_optional() {
                return Err(CompositionError::UnsatisfiedDependency {
                    contract: dependency.contract,
                    required_by: node.implementation,
                });
            }

            for &provider in matches {
                edges.push(DependencyEdge {
                    dependent: node.id,
                    dependency: provider,
                    contract: dependency.contract,
                });
                if !dependencies[node.id.0].contains(&provider) {
                    dependencies[node.id.0].push(provider);
                    dependents[provider.0].push(node.id);
                }
            }
        }
    }

    debug!(nodes = nodes.len(), edges = edges.len(), "built composition graph");

    Ok(CompositionGraph {
        nodes,
        edges,
        dependencies,
        dependents,
        providers,
        by_implementation,
    })
}

impl CompositionGraph {
    /// All nodes, in registration order.
    #[must_use]
    pub fn nodes(&self) -> &[ServiceNode] {
        &self.nodes
    }

    /// Returns the node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this graph.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &ServiceNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn find(&self, implementation: ImplementationId) -> Option<NodeId> {
        self.by_implementation.get(&implementation).copied()
    }

    /// Every edge, one per satisfying provider of each declared dependency.
    #[must_use]
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Distinct nodes `id` depends on.
    #[must_use]
    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        &self.dependencies[id.0]
    }

    /// Distinct nodes that depend on `id`.
    #[must_use]
    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        &self.dependents[id.0]
    }

    /// Nodes exporting `contract`, in binding order.
    #[must_use]
    pub fn providers_of(&self, contract: ContractId) -> &[NodeId] {
        self.providers
            .get(&contract)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_self_edge(&self, id: NodeId) -> bool {
        self.dependencies[id.0].contains(&id)
    }

    /// Maps node ids to their implementation identities.
    pub fn implementations<I>(&self, ids: I) -> BTreeSet<ImplementationId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        ids.into_iter()
            .map(|id| self.nodes[id.0].implementation)
            .collect()
    }

    /// Every node id, in registration order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
