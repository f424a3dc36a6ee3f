//! Errors raised while registering bindings and composing the graph.
//!
//! Every variant is fatal to startup: the registration set is static, so
//! composing it again without changing the registrations cannot succeed.

use std::collections::BTreeSet;

use crate::ids::{ContractId, ImplementationId};

/// Errors from the export registry, graph builder, and validators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    /// The identical `(contract, implementation)` pair was registered twice.
    #[error("{implementation} is already bound to {contract}")]
    DuplicateBinding {
        contract: ContractId,
        implementation: ImplementationId,
    },
    /// An implementation was registered again with a different dependency list.
    #[error("{implementation} was registered again with a different dependency list")]
    ConflictingImplementation { implementation: ImplementationId },
    /// A required dependency has no registered implementation.
    #[error("{required_by} requires {contract}, which has no registered implementation")]
    UnsatisfiedDependency {
        contract: ContractId,
        required_by: ImplementationId,
    },
    /// The dependency graph contains at least one cycle.
    #[error("dependency cycle between {}", join(.nodes))]
    CyclicGraph { nodes: BTreeSet<ImplementationId> },
    /// Some registrations are unreachable from the root contracts.
    #[error("services unreachable from the root contracts: {}", join(.nodes))]
    DisconnectedSubGraph { nodes: BTreeSet<ImplementationId> },
    /// A root contract has no registered implementation.
    #[error("root contract {contract} has no registered implementation")]
    UnknownRoot { contract: ContractId },
    /// Composition was requested without any root contract.
    #[error("composition requires at least one root contract")]
    NoRoots,
}

fn join(nodes: &BTreeSet<ImplementationId>) -> String {
    nodes
        .iter()
        .map(ImplementationId::name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_graph_lists_members_in_order() {
        let err = CompositionError::CyclicGraph {
            nodes: [ImplementationId::named("y"), ImplementationId::named("x")]
                .into_iter()
                .collect(),
        };
        assert_eq!(err.to_string(), "dependency cycle between x, y");
    }

    #[test]
    fn unsatisfied_dependency_names_both_sides() {
        let err = CompositionError::UnsatisfiedDependency {
            contract: ContractId::named("storage"),
            required_by: ImplementationId::named("cron"),
        };
        assert_eq!(
            err.to_string(),
            "cron requires storage, which has no registered implementation"
        );
    }
}
