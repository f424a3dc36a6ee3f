//! Validated graphs: acyclic and fully reachable from their roots.

use crate::connectivity::check_connected;
use crate::cycles::check_acyclic;
use crate::error::CompositionError;
use crate::graph::CompositionGraph;
use crate::ids::ContractId;

/// A [`CompositionGraph`] that passed both the cycle and connectivity checks.
///
/// Only [`ValidatedGraph::validate`] produces one, so the order resolver can
/// never be handed a graph without a valid construction order.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    graph: CompositionGraph,
    roots: Vec<ContractId>,
}

impl ValidatedGraph {
    /// Runs the cycle check, then the connectivity check against `roots`.
    ///
    /// # Errors
    ///
    /// Propagates the first validator failure unchanged.
    pub fn validate(
        graph: CompositionGraph,
        roots: &[ContractId],
    ) -> Result<Self, CompositionError> {
        check_acyclic(&graph)?;
        check_connected(&graph, roots)?;
        Ok(Self {
            graph,
            roots: roots.to_vec(),
        })
    }

    #[must_use]
    pub fn graph(&self) -> &CompositionGraph {
        &self.graph
    }

    #[must_use]
    pub fn roots(&self) -> &[ContractId] {
        &self.roots
    }

    pub(crate) fn into_parts(self) -> (CompositionGraph, Vec<ContractId>) {
        (self.graph, self.roots)
    }
}
