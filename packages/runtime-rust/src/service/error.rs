//! Runtime error types.
//!
//! [`ContainerError`] covers resolution and construction failures.
//! [`StartupError`] and [`AggregateError`] carry the extra context of a
//! failed `start` and a fail-soft teardown.

use std::fmt;
use std::time::Duration;

use holobot_core::{CompositionError, ContractId, ImplementationId};

/// Failures raised by the catalog and the container.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The catalog could not be turned into a valid plan.
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// A binding was finished without exporting any contract.
    #[error("{implementation} exports no contracts")]
    NoExports { implementation: ImplementationId },

    /// The same implementation type was provided twice.
    #[error("{implementation} is already provided")]
    DuplicateProvider { implementation: ImplementationId },

    /// No live instance exports the contract right now.
    #[error("contract {contract} is not resolved")]
    ContractNotResolved { contract: ContractId },

    /// A single instance was requested but several providers exist.
    #[error("contract {contract} has {count} providers; request all of them instead")]
    AmbiguousContract { contract: ContractId, count: usize },

    /// A factory asked for a contract its binding never declared.
    #[error("{implementation} did not declare a dependency on {contract}")]
    UndeclaredDependency {
        implementation: ImplementationId,
        contract: ContractId,
    },

    /// An exported value was not of the type its contract names.
    #[error("export of {contract} by {implementation} has an unexpected type")]
    TypeMismatch {
        implementation: ImplementationId,
        contract: ContractId,
    },

    /// A factory or `init` hook returned an error.
    #[error("failed to construct {implementation}: {source}")]
    ConstructionFailed {
        implementation: ImplementationId,
        #[source]
        source: anyhow::Error,
    },

    /// A node was never constructed because one of its dependencies failed.
    #[error("{dependent} was not constructed because {failed} failed")]
    DependencyFailed {
        failed: ImplementationId,
        dependent: ImplementationId,
    },

    /// `start` was called while the container was starting or running.
    #[error("container is already started")]
    AlreadyStarted,

    /// `start_within` ran past its deadline.
    #[error("startup did not finish within {0:?}")]
    StartupTimeout(Duration),
}

// ---------------------------------------------------------------------------
// TeardownFailure / AggregateError
// ---------------------------------------------------------------------------

/// One failed `shutdown` hook.
#[derive(Debug, thiserror::Error)]
#[error("{implementation}: {source}")]
pub struct TeardownFailure {
    pub implementation: ImplementationId,
    #[source]
    pub source: anyhow::Error,
}

/// Every failure collected by a fail-soft teardown, in teardown order.
#[derive(Debug)]
pub struct AggregateError {
    pub failures: Vec<TeardownFailure>,
}

impl AggregateError {
    /// Implementations whose teardown failed, in teardown order.
    #[must_use]
    pub fn implementations(&self) -> Vec<ImplementationId> {
        self.failures.iter().map(|f| f.implementation).collect()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} teardown step(s) failed", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

// ---------------------------------------------------------------------------
// StartupError
// ---------------------------------------------------------------------------

/// Why `start` aborted, plus the fallout.
#[derive(Debug, thiserror::Error)]
#[error("startup aborted: {cause}")]
pub struct StartupError {
    /// The failure that stopped construction.
    #[source]
    pub cause: ContainerError,
    /// One `DependencyFailed` per transitive dependent that never ran.
    pub blocked: Vec<ContainerError>,
    /// Teardown failures hit while rolling back already-live services.
    pub rollback: Option<AggregateError>,
}

impl From<ContainerError> for StartupError {
    fn from(cause: ContainerError) -> Self {
        Self {
            cause,
            blocked: Vec::new(),
            rollback: None,
        }
    }
}
