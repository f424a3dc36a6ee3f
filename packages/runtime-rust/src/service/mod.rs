//! Service composition and lifecycle.
//!
//! 1. **Catalog** (`catalog`): typed bindings, contract -> factory
//! 2. **Container** (`container`): executes the resolved plan, then tears it down
//! 3. **Lifecycle** (`lifecycle`): `ManagedService` hooks and container phases
//! 4. **Background workers** (`worker`): periodic tasks owned by services

pub mod catalog;
pub mod config;
pub mod container;
pub mod dependencies;
pub mod error;
pub mod lifecycle;
pub mod worker;

pub use catalog::{Binding, ServiceCatalog};
pub use config::RuntimeConfig;
pub use container::Container;
pub use dependencies::Dependencies;
pub use error::{AggregateError, ContainerError, StartupError, TeardownFailure};
pub use lifecycle::{ContainerPhase, ManagedService, PhaseTracker, ServiceContext};
pub use worker::{BackgroundRunnable, BackgroundWorker};
