//! Service catalog: typed bindings from contracts to factories.
//!
//! Extensions describe each service once:
//!
//! ```ignore
//! catalog
//!     .provide::<CronScheduler>()
//!     .requires::<dyn Storage>()
//!     .exports::<dyn Scheduler>(|s| s)
//!     .factory(|deps| async move { Ok(CronScheduler::new(deps.one::<dyn Storage>()?)) })?;
//! ```
//!
//! The catalog feeds the declared shape into an [`ExportRegistry`] and keeps
//! the factory next to it. [`ServiceCatalog::compose`] validates the shape
//! and hands both to a [`Container`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use holobot_core::{
    compose, CompositionError, ContractId, Dependency, ExportRegistry, Implementation,
    InitializationPlan,
};

use super::container::Container;
use super::dependencies::{Dependencies, ExportHandle};
use super::error::ContainerError;
use super::lifecycle::ManagedService;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type Factory = Box<dyn Fn(Dependencies) -> BoxFuture<anyhow::Result<Constructed>> + Send + Sync>;

type Cast<T> = Box<dyn Fn(Arc<T>) -> ExportHandle + Send + Sync>;

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// A freshly built instance with its exports already cast.
pub(crate) struct Constructed {
    pub(crate) service: Arc<dyn ManagedService>,
    pub(crate) exports: Vec<(ContractId, ExportHandle)>,
}

/// Factory plus descriptor for one implementation.
pub(crate) struct Provider {
    implementation: Implementation,
    factory: Factory,
}

impl Provider {
    pub(crate) fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    pub(crate) fn construct(&self, deps: Dependencies) -> BoxFuture<anyhow::Result<Constructed>> {
        (self.factory)(deps)
    }
}

// ---------------------------------------------------------------------------
// ServiceCatalog
// ---------------------------------------------------------------------------

/// Collects bindings declared by extensions.
///
/// Each binding registers exactly one new implementation, so `providers`
/// lines up with the registry's implementation order and therefore with the
/// node ids of any graph built from it.
#[derive(Default)]
pub struct ServiceCatalog {
    registry: ExportRegistry,
    providers: Vec<Provider>,
}

impl ServiceCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a binding for the concrete service type `T`.
    pub fn provide<T: ManagedService>(&mut self) -> Binding<'_, T> {
        Binding {
            catalog: self,
            implementation: Implementation::of::<T>(),
            exports: Vec::new(),
        }
    }

    /// The contract bindings declared so far.
    #[must_use]
    pub fn registry(&self) -> &ExportRegistry {
        &self.registry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolves the plan without consuming the catalog.
    ///
    /// # Errors
    ///
    /// Any [`CompositionError`] from graph building or validation.
    pub fn plan(&self, roots: &[ContractId]) -> Result<InitializationPlan, CompositionError> {
        compose(&self.registry, roots)
    }

    /// Validates the catalog against `roots` and builds a container.
    ///
    /// Nothing is constructed yet; call [`Container::start`].
    ///
    /// # Errors
    ///
    /// [`ContainerError::Composition`] wrapping the first composition failure.
    pub fn compose(self, roots: &[ContractId]) -> Result<Container, ContainerError> {
        let plan = compose(&self.registry, roots)?;
        debug_assert!(plan
            .graph()
            .nodes()
            .iter()
            .zip(&self.providers)
            .all(|(node, provider)| node.implementation() == provider.implementation().id()));
        Ok(Container::new(plan, self.providers))
    }

    fn insert(
        &mut self,
        implementation: Implementation,
        contracts: &[ContractId],
        factory: Factory,
    ) -> Result<(), ContainerError> {
        let id = implementation.id();
        if contracts.is_empty() {
            return Err(ContainerError::NoExports { implementation: id });
        }
        if self.registry.implementation(id).is_some() {
            return Err(ContainerError::DuplicateProvider { implementation: id });
        }
        self.registry.register_all(contracts, &implementation)?;
        self.providers.push(Provider {
            implementation,
            factory,
        });
        Ok(())
    }
}

impl std::fmt::Debug for ServiceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCatalog")
            .field("bindings", &self.registry.len())
            .field("providers", &self.providers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Builder for one implementation; finished by [`Binding::factory`].
#[must_use = "a binding is only registered once `factory` is called"]
pub struct Binding<'a, T> {
    catalog: &'a mut ServiceCatalog,
    implementation: Implementation,
    exports: Vec<(ContractId, Cast<T>)>,
}

impl<T: ManagedService> Binding<'_, T> {
    /// Declares a required dependency on contract `C`.
    pub fn requires<C: ?Sized + 'static>(mut self) -> Self {
        self.implementation
            .push(Dependency::required(ContractId::of::<C>()));
        self
    }

    /// Declares an optional dependency on contract `C`.
    pub fn optional<C: ?Sized + 'static>(mut self) -> Self {
        self.implementation
            .push(Dependency::optional(ContractId::of::<C>()));
        self
    }

    /// Exports the instance as contract `C` through `cast`, usually an
    /// unsizing identity such as `|s| s`.
    pub fn exports<C>(mut self, cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let id = self.implementation.id();
        self.exports.push((
            ContractId::of::<C>(),
            Box::new(move |instance: Arc<T>| ExportHandle::new(id, cast(instance))),
        ));
        self
    }

    /// Exports the instance under its own concrete type.
    pub fn exports_self(self) -> Self {
        self.exports::<T>(|instance| instance)
    }

    /// Registers the binding with `factory` as its constructor.
    ///
    /// # Errors
    ///
    /// `NoExports` if nothing was exported, `DuplicateProvider` if `T` was
    /// already provided, or a registry error for a repeated export.
    pub fn factory<F, Fut>(self, build: F) -> Result<(), ContainerError>
    where
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let Self {
            catalog,
            implementation,
            exports,
        } = self;
        let contracts: Vec<ContractId> = exports.iter().map(|(contract, _)| *contract).collect();
        let exports = Arc::new(exports);

        let factory: Factory = Box::new(move |deps: Dependencies| -> BoxFuture<anyhow::Result<Constructed>> {
            let pending = build(deps);
            let exports = Arc::clone(&exports);
            Box::pin(async move {
                let instance = Arc::new(pending.await?);
                let exports = exports
                    .iter()
                    .map(|(contract, cast)| (*contract, cast(Arc::clone(&instance))))
                    .collect();
                let service: Arc<dyn ManagedService> = instance;
                Ok::<_, anyhow::Error>(Constructed { service, exports })
            })
        });

        catalog.insert(implementation, &contracts, factory)
    }

    /// Registers the binding with a synchronous constructor.
    ///
    /// # Errors
    ///
    /// Same as [`factory`](Self::factory).
    pub fn value<F>(self, build: F) -> Result<(), ContainerError>
    where
        F: Fn(&Dependencies) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.factory(move |deps| std::future::ready(build(&deps)))
    }
}
