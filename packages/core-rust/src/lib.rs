//! Holobot core: export registry, composition graph, and initialization order.
//!
//! The pipeline is pure and synchronous:
//!
//! 1. **Registry** (`registry`): contract -> implementation bindings
//! 2. **Graph** (`graph`): one node per implementation, one edge per satisfied dependency
//! 3. **Validation** (`cycles`, `connectivity`, `validate`): no cycles, everything reachable
//! 4. **Order** (`order`): deterministic construction plan, reversed for teardown
//!
//! [`compose`] runs all stages. The async runtime that executes a plan lives
//! in `holobot-runtime`.

pub mod compose;
pub mod connectivity;
pub mod cycles;
pub mod error;
pub mod graph;
pub mod ids;
pub mod order;
pub mod registry;
pub mod snapshot;
pub mod validate;

pub use compose::compose;
pub use connectivity::{check_connected, find_disconnected};
pub use cycles::{check_acyclic, find_cycles};
pub use error::CompositionError;
pub use graph::{build, CompositionGraph, DependencyEdge, NodeId, NodeState, ServiceNode};
pub use ids::{ContractId, ImplementationId};
pub use order::{resolve_order, InitializationPlan};
pub use registry::{Dependency, DependencyKind, ExportBinding, ExportRegistry, Implementation};
pub use snapshot::GraphSnapshot;
pub use validate::ValidatedGraph;
