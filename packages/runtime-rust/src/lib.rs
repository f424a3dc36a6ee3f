//! Holobot runtime: turns extension bindings into a running set of services.
//!
//! Extensions register typed bindings into a [`ServiceCatalog`]. Composing
//! the catalog validates the dependency graph (see `holobot-core`) and
//! yields a [`Container`] that constructs services in dependency order and
//! tears them down in reverse.

pub mod builtin;
pub mod extension;
pub mod logging;
pub mod service;
pub mod traits;

pub use extension::{Extension, ExtensionError, ExtensionLoader, LoadReport};
pub use service::{
    AggregateError, Container, ContainerError, ContainerPhase, Dependencies, ManagedService,
    RuntimeConfig, ServiceCatalog, ServiceContext, StartupError,
};
pub use traits::{BotEvent, Clock, EventBus, EventListener, Job, JobScheduler, KeyValueStore};
