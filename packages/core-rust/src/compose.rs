//! Single entry point from registrations to an initialization plan.

use tracing::{info, warn};

use crate::error::CompositionError;
use crate::graph::build;
use crate::ids::ContractId;
use crate::order::{resolve_order, InitializationPlan};
use crate::registry::ExportRegistry;
use crate::validate::ValidatedGraph;

/// Builds, validates, and orders the graph for `registry` against `roots`.
///
/// No partial plan is ever produced: the first failing stage aborts.
///
/// # Errors
///
/// Returns the [`CompositionError`] of the first failing stage: graph
/// building, cycle detection, or the connectivity check.
pub fn compose(
    registry: &ExportRegistry,
    roots: &[ContractId],
) -> Result<InitializationPlan, CompositionError> {
    let result = build(registry)
        .and_then(|graph| ValidatedGraph::validate(graph, roots))
        .map(resolve_order);

    match &result {
        Ok(plan) => info!(
            services = plan.len(),
            edges = plan.graph().edges().len(),
            roots = roots.len(),
            "composition plan resolved"
        ),
        Err(err) => warn!(error = %err, "composition failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ImplementationId;
    use crate::registry::Implementation;

    const STORAGE: ContractId = ContractId::named("Storage");
    const SCHEDULER: ContractId = ContractId::named("Scheduler");

    #[test]
    fn scheduler_scenario() {
        let mut registry = ExportRegistry::new();
        registry
            .register(STORAGE, &Implementation::new(ImplementationId::named("SqlStorage")))
            .unwrap();
        registry
            .register(
                SCHEDULER,
                &Implementation::new(ImplementationId::named("CronScheduler")).requires(STORAGE),
            )
            .unwrap();

        let plan = compose(&registry, &[SCHEDULER]).unwrap();
        assert_eq!(
            plan.implementations(),
            vec![
                ImplementationId::named("SqlStorage"),
                ImplementationId::named("CronScheduler"),
            ]
        );
    }

    #[test]
    fn mutual_dependency_fails_with_both_nodes() {
        let x = ContractId::named("X");
        let y = ContractId::named("Y");
        let mut registry = ExportRegistry::new();
        registry
            .register(x, &Implementation::new(ImplementationId::named("X")).requires(y))
            .unwrap();
        registry
            .register(y, &Implementation::new(ImplementationId::named("Y")).requires(x))
            .unwrap();

        let err = compose(&registry, &[x]).unwrap_err();
        assert_eq!(
            err,
            CompositionError::CyclicGraph {
                nodes: [ImplementationId::named("X"), ImplementationId::named("Y")]
                    .into_iter()
                    .collect(),
            }
        );
    }

    #[test]
    fn unreachable_registration_fails() {
        let mut registry = ExportRegistry::new();
        registry
            .register(STORAGE, &Implementation::new(ImplementationId::named("SqlStorage")))
            .unwrap();
        registry
            .register(
                ContractId::named("Giveaways"),
                &Implementation::new(ImplementationId::named("GiveawayScraper")),
            )
            .unwrap();

        let err = compose(&registry, &[STORAGE]).unwrap_err();
        assert_eq!(
            err,
            CompositionError::DisconnectedSubGraph {
                nodes: [ImplementationId::named("GiveawayScraper")].into_iter().collect(),
            }
        );
    }

    #[test]
    fn unsatisfied_dependency_aborts_before_validation() {
        let mut registry = ExportRegistry::new();
        registry
            .register(
                SCHEDULER,
                &Implementation::new(ImplementationId::named("CronScheduler")).requires(STORAGE),
            )
            .unwrap();
        assert!(matches!(
            compose(&registry, &[SCHEDULER]),
            Err(CompositionError::UnsatisfiedDependency { .. })
        ));
    }

    #[test]
    fn plan_contains_every_node_once() {
        let mut registry = ExportRegistry::new();
        let listener = ContractId::named("Listener");
        for name in ["Welcome", "Audit", "Leveling"] {
            registry
                .register(
                    listener,
                    &Implementation::new(ImplementationId::named(name)).requires(STORAGE),
                )
                .unwrap();
        }
        registry
            .register(STORAGE, &Implementation::new(ImplementationId::named("SqlStorage")))
            .unwrap();

        let plan = compose(&registry, &[listener]).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.implementations()[0], ImplementationId::named("SqlStorage"));
    }
}
