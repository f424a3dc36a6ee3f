//! Reachability of registrations from the application's root contracts.
//!
//! An unreachable registration is treated as forgotten wiring and reported,
//! never pruned.

use std::collections::{BTreeSet, VecDeque};

use crate::error::CompositionError;
use crate::graph::{CompositionGraph, NodeId};
use crate::ids::ContractId;

/// Nodes exporting any of `roots`, deduplicated, in first-seen order.
///
/// # Errors
///
/// Returns [`CompositionError::NoRoots`] for an empty root set and
/// [`CompositionError::UnknownRoot`] for a root without a provider.
pub fn root_nodes(
    graph: &CompositionGraph,
    roots: &[ContractId],
) -> Result<Vec<NodeId>, CompositionError> {
    if roots.is_empty() {
        return Err(CompositionError::NoRoots);
    }
    let mut nodes = Vec::new();
    for &contract in roots {
        let providers = graph.providers_of(contract);
        if providers.is_empty() {
            return Err(CompositionError::UnknownRoot { contract });
        }
        for &node in providers {
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }
    }
    Ok(nodes)
}

/// Returns every node not reachable from a provider of `roots`.
///
/// Roots without providers contribute nothing; use [`check_connected`] to
/// have them reported.
#[must_use]
pub fn find_disconnected(graph: &CompositionGraph, roots: &[ContractId]) -> BTreeSet<NodeId> {
    let mut reached = vec![false; graph.len()];
    let mut queue: VecDeque<NodeId> = VecDeque::new();

    for &contract in roots {
        for &node in graph.providers_of(contract) {
            if !reached[node.index()] {
                reached[node.index()] = true;
                queue.push_back(node);
            }
        }
    }

    while let Some(node) = queue.pop_front() {
        for &dependency in graph.dependencies_of(node) {
            if !reached[dependency.index()] {
                reached[dependency.index()] = true;
                queue.push_back(dependency);
            }
        }
    }

    graph
        .node_ids()
        .filter(|id| !reached[id.index()])
        .collect()
}

/// Fails unless every node is reachable from the roots.
///
/// # Errors
///
/// Returns [`CompositionError::NoRoots`] or [`CompositionError::UnknownRoot`]
/// for an unusable root set, and [`CompositionError::DisconnectedSubGraph`]
/// naming every unreachable implementation.
pub fn check_connected(
    graph: &CompositionGraph,
    roots: &[ContractId],
) -> Result<(), CompositionError> {
    root_nodes(graph, roots)?;
    let disconnected = find_disconnected(graph, roots);
    if disconnected.is_empty() {
        return Ok(());
    }
    Err(CompositionError::DisconnectedSubGraph {
        nodes: graph.implementations(disconnected),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build;
    use crate::ids::ImplementationId;
    use crate::registry::{ExportRegistry, Implementation};

    const STORAGE: ContractId = ContractId::named("storage");
    const SCHEDULER: ContractId = ContractId::named("scheduler");
    const GIVEAWAYS: ContractId = ContractId::named("giveaways");

    fn imp(name: &'static str) -> Implementation {
        Implementation::new(ImplementationId::named(name))
    }

    fn graph() -> CompositionGraph {
        let mut registry = ExportRegistry::new();
        registry.register(STORAGE, &imp("sql")).unwrap();
        registry
            .register(SCHEDULER, &imp("cron").requires(STORAGE))
            .unwrap();
        registry
            .register(GIVEAWAYS, &imp("scraper").requires(STORAGE))
            .unwrap();
        build(&registry).unwrap()
    }

    #[test]
    fn everything_reachable_from_all_roots() {
        let graph = graph();
        assert!(find_disconnected(&graph, &[SCHEDULER, GIVEAWAYS]).is_empty());
        assert!(check_connected(&graph, &[SCHEDULER, GIVEAWAYS]).is_ok());
    }

    #[test]
    fn unreachable_node_is_flagged() {
        let graph = graph();
        let disconnected = find_disconnected(&graph, &[SCHEDULER]);
        assert_eq!(
            graph.implementations(disconnected),
            [ImplementationId::named("scraper")].into_iter().collect()
        );

        let err = check_connected(&graph, &[SCHEDULER]).unwrap_err();
        assert!(matches!(
            err,
            CompositionError::DisconnectedSubGraph { ref nodes }
                if nodes.contains(&ImplementationId::named("scraper"))
        ));
    }

    #[test]
    fn dependencies_do_not_reach_dependents() {
        let graph = graph();
        let disconnected = find_disconnected(&graph, &[STORAGE]);
        assert_eq!(disconnected.len(), 2);
    }

    #[test]
    fn empty_roots_are_rejected() {
        assert_eq!(check_connected(&graph(), &[]), Err(CompositionError::NoRoots));
    }

    #[test]
    fn root_without_provider_is_rejected() {
        let missing = ContractId::named("moderation");
        assert_eq!(
            check_connected(&graph(), &[SCHEDULER, missing]),
            Err(CompositionError::UnknownRoot { contract: missing })
        );
        // Reachability alone ignores the unknown root.
        assert_eq!(find_disconnected(&graph(), &[missing]).len(), 3);
    }

    #[test]
    fn root_nodes_deduplicate_shared_providers() {
        let mut registry = ExportRegistry::new();
        let sql = imp("sql");
        registry.register(STORAGE, &sql).unwrap();
        registry.register(SCHEDULER, &sql).unwrap();
        let graph = build(&registry).unwrap();

        let roots = root_nodes(&graph, &[STORAGE, SCHEDULER]).unwrap();
        assert_eq!(roots.len(), 1);
    }
}
