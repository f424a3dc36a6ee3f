//! Export registry: contract-to-implementation bindings.
//!
//! Feature modules call [`ExportRegistry::register`] during the bootstrap
//! pass. A contract may be bound to many implementations (fan-out, e.g. a
//! set of event listeners) and an implementation may export many contracts.
//! Bindings are never mutated after registration.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::CompositionError;
use crate::ids::{ContractId, ImplementationId};

// ---------------------------------------------------------------------------
// Dependency
// ---------------------------------------------------------------------------

/// Whether a dependency must be satisfied by at least one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// At least one provider must be registered.
    Required,
    /// Zero providers is acceptable; the dependency is simply absent.
    Optional,
}

/// A contract an implementation needs before it can be constructed.
///
/// Every registered provider of the contract is wired in, so a dependency
/// on a fan-out contract receives the whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    pub contract: ContractId,
    pub kind: DependencyKind,
}

impl Dependency {
    #[must_use]
    pub const fn required(contract: ContractId) -> Self {
        Self {
            contract,
            kind: DependencyKind::Required,
        }
    }

    #[must_use]
    pub const fn optional(contract: ContractId) -> Self {
        Self {
            contract,
            kind: DependencyKind::Optional,
        }
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.kind == DependencyKind::Optional
    }
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

/// Descriptor of a concrete implementation and its declared dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implementation {
    id: ImplementationId,
    dependencies: Vec<Dependency>,
}

impl Implementation {
    /// Creates a descriptor without dependencies.
    #[must_use]
    pub fn new(id: ImplementationId) -> Self {
        Self {
            id,
            dependencies: Vec::new(),
        }
    }

    /// Descriptor for the concrete type `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(ImplementationId::of::<T>())
    }

    /// Adds a required dependency on `contract`.
    #[must_use]
    pub fn requires(mut self, contract: ContractId) -> Self {
        self.push(Dependency::required(contract));
        self
    }

    /// Adds an optional dependency on `contract`.
    #[must_use]
    pub fn optional(mut self, contract: ContractId) -> Self {
        self.push(Dependency::optional(contract));
        self
    }

    /// Appends an already-built dependency.
    ///
    /// A contract is declared at most once. Declaring it again keeps the
    /// first position and upgrades an optional declaration to required.
    pub fn push(&mut self, dependency: Dependency) {
        match self
            .dependencies
            .iter_mut()
            .find(|declared| declared.contract == dependency.contract)
        {
            Some(declared) => {
                if !dependency.is_optional() {
                    declared.kind = DependencyKind::Required;
                }
            }
            None => self.dependencies.push(dependency),
        }
    }

    #[must_use]
    pub fn id(&self) -> ImplementationId {
        self.id
    }

    /// Declared dependencies in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}

// ---------------------------------------------------------------------------
// ExportBinding
// ---------------------------------------------------------------------------

/// A registered association between a contract and one implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportBinding {
    pub contract: ContractId,
    pub implementation: ImplementationId,
    /// Position of this binding in registration order.
    pub index: usize,
}

// ---------------------------------------------------------------------------
// ExportRegistry
// ---------------------------------------------------------------------------

/// Collects bindings declared by feature modules.
///
/// Implementations are remembered in the order they were first registered;
/// that order is the stable tie-break key used by the order resolver.
#[derive(Debug, Clone, Default)]
pub struct ExportRegistry {
    bindings: Vec<ExportBinding>,
    /// Contract -> indices into `bindings`, in registration order.
    by_contract: HashMap<ContractId, Vec<usize>>,
    implementations: Vec<Implementation>,
    /// Implementation -> index into `implementations`.
    by_implementation: HashMap<ImplementationId, usize>,
}

impl ExportRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `implementation` to `contract`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::DuplicateBinding`] if the identical pair is
    /// already registered, and [`CompositionError::ConflictingImplementation`]
    /// if the implementation was registered before with different dependencies.
    pub fn register(
        &mut self,
        contract: ContractId,
        implementation: &Implementation,
    ) -> Result<(), CompositionError> {
        let id = implementation.id();

        if self
            .providers(contract)
            .any(|binding| binding.implementation == id)
        {
            return Err(CompositionError::DuplicateBinding {
                contract,
                implementation: id,
            });
        }

        match self.by_implementation.get(&id) {
            Some(&known) if self.implementations[known] != *implementation => {
                return Err(CompositionError::ConflictingImplementation { implementation: id });
            }
            Some(_) => {}
            None => {
                self.by_implementation.insert(id, self.implementations.len());
                self.implementations.push(implementation.clone());
            }
        }

        let index = self.bindings.len();
        self.bindings.push(ExportBinding {
            contract,
            implementation: id,
            index,
        });
        self.by_contract.entry(contract).or_default().push(index);

        debug!(
            contract = contract.short_name(),
            implementation = id.short_name(),
            index,
            "registered export"
        );
        Ok(())
    }

    /// Binds `implementation` to every contract in `contracts`, or to none.
    ///
    /// # Errors
    ///
    /// Fails like [`register`](Self::register), and with
    /// [`CompositionError::DuplicateBinding`] when `contracts` repeats a
    /// contract. The registry is left unchanged on error.
    pub fn register_all(
        &mut self,
        contracts: &[ContractId],
        implementation: &Implementation,
    ) -> Result<(), CompositionError> {
        let id = implementation.id();
        if matches!(self.implementation(id), Some(known) if known != implementation) {
            return Err(CompositionError::ConflictingImplementation { implementation: id });
        }
        for (position, &contract) in contracts.iter().enumerate() {
            let repeated = contracts[..position].contains(&contract);
            if repeated
                || self
                    .providers(contract)
                    .any(|binding| binding.implementation == id)
            {
                return Err(CompositionError::DuplicateBinding {
                    contract,
                    implementation: id,
                });
            }
        }
        for &contract in contracts {
            self.register(contract, implementation)?;
        }
        Ok(())
    }

    /// Returns every implementation bound to `contract`.
    ///
    /// An empty set is not an error. The set carries no order; use
    /// [`providers`](Self::providers) when order matters.
    #[must_use]
    pub fn lookup(&self, contract: ContractId) -> HashSet<ImplementationId> {
        self.providers(contract)
            .map(|binding| binding.implementation)
            .collect()
    }

    /// Bindings for `contract` in registration order.
    pub fn providers(&self, contract: ContractId) -> impl Iterator<Item = &ExportBinding> + '_ {
        self.by_contract
            .get(&contract)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&index| &self.bindings[index])
    }

    /// Contracts exported by `implementation`, in registration order.
    pub fn exports_of(
        &self,
        implementation: ImplementationId,
    ) -> impl Iterator<Item = ContractId> + '_ {
        self.bindings
            .iter()
            .filter(move |binding| binding.implementation == implementation)
            .map(|binding| binding.contract)
    }

    /// Implementation descriptors in first-registration order.
    #[must_use]
    pub fn implementations(&self) -> &[Implementation] {
        &self.implementations
    }

    #[must_use]
    pub fn implementation(&self, id: ImplementationId) -> Option<&Implementation> {
        self.by_implementation
            .get(&id)
            .map(|&index| &self.implementations[index])
    }

    /// All bindings in registration order.
    #[must_use]
    pub fn bindings(&self) -> &[ExportBinding] {
        &self.bindings
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
