//! Built-in platform services and the extension that binds them.

pub mod clock;
pub mod events;
pub mod jobs;
pub mod store;

use holobot_core::ContractId;

pub use clock::SystemClock;
pub use events::{AuditLog, EventDispatcher};
pub use jobs::{AuditRetention, IntervalScheduler};
pub use store::MemoryStore;

use crate::extension::Extension;
use crate::service::{ContainerError, ServiceCatalog};
use crate::traits::{Clock, EventBus, EventListener, Job, JobScheduler, KeyValueStore};

/// Binds the clock, store, event bus, audit log, and job scheduler.
///
/// Roots: [`EventBus`] and [`JobScheduler`].
#[derive(Debug, Default)]
pub struct CoreExtension;

impl Extension for CoreExtension {
    fn name(&self) -> &'static str {
        "core"
    }

    fn register(&self, catalog: &mut ServiceCatalog) -> Result<(), ContainerError> {
        catalog
            .provide::<SystemClock>()
            .exports::<dyn Clock>(|s| s)
            .value(|_| Ok(SystemClock))?;

        catalog
            .provide::<MemoryStore>()
            .exports::<dyn KeyValueStore>(|s| s)
            .value(|_| Ok(MemoryStore::new()))?;

        catalog
            .provide::<AuditLog>()
            .requires::<dyn KeyValueStore>()
            .requires::<dyn Clock>()
            .exports::<dyn EventListener>(|s| s)
            .value(|deps| {
                Ok(AuditLog::new(
                    deps.one::<dyn KeyValueStore>()?,
                    deps.one::<dyn Clock>()?,
                ))
            })?;

        catalog
            .provide::<EventDispatcher>()
            .optional::<dyn EventListener>()
            .exports::<dyn EventBus>(|s| s)
            .exports_self()
            .value(|deps| Ok(EventDispatcher::new(deps.all::<dyn EventListener>()?)))?;

        catalog
            .provide::<AuditRetention>()
            .requires::<dyn KeyValueStore>()
            .requires::<dyn Clock>()
            .exports::<dyn Job>(|s| s)
            .value(|deps| {
                Ok(AuditRetention::new(
                    deps.one::<dyn KeyValueStore>()?,
                    deps.one::<dyn Clock>()?,
                    AuditRetention::DEFAULT_RETENTION,
                ))
            })?;

        catalog
            .provide::<IntervalScheduler>()
            .requires::<dyn Clock>()
            .optional::<dyn Job>()
            .exports::<dyn JobScheduler>(|s| s)
            .value(|deps| {
                Ok(IntervalScheduler::new(
                    deps.all::<dyn Job>()?,
                    deps.one::<dyn Clock>()?,
                ))
            })
    }

    fn roots(&self) -> Vec<ContractId> {
        vec![
            ContractId::of::<dyn EventBus>(),
            ContractId::of::<dyn JobScheduler>(),
        ]
    }
}
