//! Typed access to constructed exports.
//!
//! An export is an `Arc<C>` for its contract type `C` (usually a trait
//! object), stored type-erased so instances of unrelated contracts can share
//! one table. Lookups downcast back to `Arc<C>`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use holobot_core::{ContractId, Dependency, ImplementationId};

use super::error::ContainerError;

// ---------------------------------------------------------------------------
// ExportHandle
// ---------------------------------------------------------------------------

/// A type-erased `Arc<C>` plus the implementation that produced it.
#[derive(Clone)]
pub(crate) struct ExportHandle {
    implementation: ImplementationId,
    value: Arc<dyn Any + Send + Sync>,
}

impl ExportHandle {
    pub(crate) fn new<C>(implementation: ImplementationId, value: Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        Self {
            implementation,
            value: Arc::new(value),
        }
    }

    fn downcast<C>(&self, contract: ContractId) -> Result<Arc<C>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.value
            .downcast_ref::<Arc<C>>()
            .cloned()
            .ok_or(ContainerError::TypeMismatch {
                implementation: self.implementation,
                contract,
            })
    }
}

impl std::fmt::Debug for ExportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportHandle")
            .field("implementation", &self.implementation)
            .finish_non_exhaustive()
    }
}

/// Exactly one provider of `contract`, downcast to `Arc<C>`.
pub(crate) fn exactly_one<C>(
    contract: ContractId,
    handles: &[ExportHandle],
) -> Result<Arc<C>, ContainerError>
where
    C: ?Sized + Send + Sync + 'static,
{
    match handles {
        [] => Err(ContainerError::ContractNotResolved { contract }),
        [single] => single.downcast(contract),
        many => Err(ContainerError::AmbiguousContract {
            contract,
            count: many.len(),
        }),
    }
}

/// Every provider of `contract` in binding order.
pub(crate) fn every<C>(
    contract: ContractId,
    handles: &[ExportHandle],
) -> Result<Vec<Arc<C>>, ContainerError>
where
    C: ?Sized + Send + Sync + 'static,
{
    handles.iter().map(|h| h.downcast(contract)).collect()
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// The resolved dependencies handed to a factory.
///
/// Only contracts the binding declared are visible. A declared optional
/// dependency with no provider resolves to `None` or an empty list.
pub struct Dependencies {
    requester: ImplementationId,
    declared: HashMap<ContractId, Vec<ExportHandle>>,
}

impl Dependencies {
    pub(crate) fn new(requester: ImplementationId) -> Self {
        Self {
            requester,
            declared: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, dependency: &Dependency, handles: Vec<ExportHandle>) {
        self.declared
            .entry(dependency.contract)
            .or_default()
            .extend(handles);
    }

    /// Implementation being constructed.
    #[must_use]
    pub fn requester(&self) -> ImplementationId {
        self.requester
    }

    fn handles(&self, contract: ContractId) -> Result<&[ExportHandle], ContainerError> {
        self.declared
            .get(&contract)
            .map(Vec::as_slice)
            .ok_or(ContainerError::UndeclaredDependency {
                implementation: self.requester,
                contract,
            })
    }

    /// The single provider of `C`.
    ///
    /// # Errors
    ///
    /// `UndeclaredDependency` if `C` was not declared, `ContractNotResolved`
    /// if it has no provider, `AmbiguousContract` if it has several.
    pub fn one<C>(&self) -> Result<Arc<C>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = ContractId::of::<C>();
        exactly_one(contract, self.handles(contract)?)
    }

    /// Every provider of `C`, in binding order. May be empty for optional
    /// dependencies.
    ///
    /// # Errors
    ///
    /// `UndeclaredDependency` if `C` was not declared.
    pub fn all<C>(&self) -> Result<Vec<Arc<C>>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = ContractId::of::<C>();
        every(contract, self.handles(contract)?)
    }

    /// The provider of `C` if there is one.
    ///
    /// # Errors
    ///
    /// `UndeclaredDependency` if `C` was not declared, `AmbiguousContract`
    /// if it has several providers.
    pub fn maybe<C>(&self) -> Result<Option<Arc<C>>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = ContractId::of::<C>();
        match self.handles(contract)? {
            [] => Ok(None),
            handles => exactly_one(contract, handles).map(Some),
        }
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("requester", &self.requester)
            .field("declared", &self.declared.keys().collect::<Vec<_>>())
            .finish()
    }
}
