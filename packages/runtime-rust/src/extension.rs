//! Feature extensions: units that contribute bindings and root contracts.
//!
//! Each extension registers its services into a shared [`ServiceCatalog`]
//! during bootstrap. The roots of all loaded extensions become the roots the
//! composition is validated against, so a service no root reaches is
//! reported instead of silently constructed.

use holobot_core::ContractId;
use tracing::info;

use crate::service::{Container, ContainerError, RuntimeConfig, ServiceCatalog};

/// A feature module.
pub trait Extension: Send + Sync {
    /// Unique name, matched against `RuntimeConfig::disabled_extensions`.
    fn name(&self) -> &'static str;

    /// Declares this extension's bindings.
    ///
    /// # Errors
    ///
    /// Any binding error from the catalog.
    fn register(&self, catalog: &mut ServiceCatalog) -> Result<(), ContainerError>;

    /// Contracts this extension needs live. Empty for pure providers.
    fn roots(&self) -> Vec<ContractId> {
        Vec::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("extension {0} is added more than once")]
    Duplicate(&'static str),

    #[error("extension {extension} failed to register: {source}")]
    Registration {
        extension: &'static str,
        #[source]
        source: ContainerError,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// What [`ExtensionLoader::load`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    /// Roots of the loaded extensions, first occurrence order.
    pub roots: Vec<ContractId>,
}

/// Ordered set of extensions to bootstrap from.
#[derive(Default)]
pub struct ExtensionLoader {
    extensions: Vec<Box<dyn Extension>>,
}

impl ExtensionLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    /// Registers every enabled extension into `catalog`, in the order added.
    ///
    /// # Errors
    ///
    /// `Duplicate` if two extensions share a name, `Registration` on the
    /// first binding failure.
    pub fn load(
        &self,
        config: &RuntimeConfig,
        catalog: &mut ServiceCatalog,
    ) -> Result<LoadReport, ExtensionError> {
        let mut report = LoadReport::default();
        for (position, extension) in self.extensions.iter().enumerate() {
            let name = extension.name();
            if self.extensions[..position].iter().any(|e| e.name() == name) {
                return Err(ExtensionError::Duplicate(name));
            }
            if config.is_disabled(name) {
                info!(extension = name, "extension disabled");
                report.skipped.push(name);
                continue;
            }

            extension
                .register(catalog)
                .map_err(|source| ExtensionError::Registration {
                    extension: name,
                    source,
                })?;
            for root in extension.roots() {
                if !report.roots.contains(&root) {
                    report.roots.push(root);
                }
            }
            report.loaded.push(name);
        }

        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            bindings = catalog.registry().len(),
            "extensions loaded"
        );
        Ok(report)
    }

    /// Loads every enabled extension into a fresh catalog and composes it.
    ///
    /// # Errors
    ///
    /// Any load error, or the composition failure wrapped in `Container`.
    pub fn compose(&self, config: &RuntimeConfig) -> Result<(Container, LoadReport), ExtensionError> {
        let mut catalog = ServiceCatalog::new();
        let report = self.load(config, &mut catalog)?;
        let container = catalog.compose(&report.roots)?;
        Ok((container, report))
    }
}

impl std::fmt::Debug for ExtensionLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionLoader")
            .field("extensions", &self.names())
            .finish()
    }
}
