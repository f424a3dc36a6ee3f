//! Serializable view of a composition plan, for diagnostics output.

use std::fmt::Write as _;

use serde::Serialize;

use crate::graph::NodeId;
use crate::ids::{ContractId, ImplementationId};
use crate::order::InitializationPlan;
use crate::registry::Dependency;

/// One node of a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub implementation: ImplementationId,
    pub exports: Vec<ContractId>,
    pub dependencies: Vec<Dependency>,
}

/// One edge of a [`GraphSnapshot`], by implementation identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeSnapshot {
    pub dependent: ImplementationId,
    pub dependency: ImplementationId,
    pub contract: ContractId,
}

/// Nodes, edges, roots, and construction order of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    pub roots: Vec<ContractId>,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    pub order: Vec<ImplementationId>,
}

impl From<&InitializationPlan> for GraphSnapshot {
    fn from(plan: &InitializationPlan) -> Self {
        let graph = plan.graph();
        Self {
            roots: plan.roots().to_vec(),
            nodes: graph
                .nodes()
                .iter()
                .map(|node| NodeSnapshot {
                    id: node.id(),
                    implementation: node.implementation(),
                    exports: node.exports().to_vec(),
                    dependencies: node.dependencies().to_vec(),
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|edge| EdgeSnapshot {
                    dependent: graph.node(edge.dependent).implementation(),
                    dependency: graph.node(edge.dependency).implementation(),
                    contract: edge.contract,
                })
                .collect(),
            order: plan.implementations(),
        }
    }
}

impl GraphSnapshot {
    /// Renders the graph in Graphviz DOT, edges pointing at dependencies.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph composition {\n    rankdir=LR;\n");
        for (position, implementation) in self.order.iter().enumerate() {
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}. {}\"];",
                implementation,
                position + 1,
                implementation.short_name()
            );
        }
        for edge in &self.edges {
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\" [label=\"{}\"];",
                edge.dependent,
                edge.dependency,
                edge.contract.short_name()
            );
        }
        out.push_str("}\n");
        out
    }
}
