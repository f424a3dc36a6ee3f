//! Service lifecycle hooks and container phase tracking.
//!
//! Phase reads go through `ArcSwap` so `resolve` never waits on a lifecycle
//! operation; subscribers are notified of every transition over a `watch`
//! channel.

use std::any::Any;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use super::config::RuntimeConfig;

// ---------------------------------------------------------------------------
// ServiceContext
// ---------------------------------------------------------------------------

/// Context handed to every service during initialization.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<RuntimeConfig>,
}

impl ServiceContext {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

// ---------------------------------------------------------------------------
// ManagedService trait
// ---------------------------------------------------------------------------

/// Lifecycle hooks for a container-managed service.
///
/// `init` runs right after the factory returns, before any dependent is
/// constructed. `shutdown` runs in reverse construction order. Both default
/// to no-ops, so plain value services only need an empty impl.
#[async_trait]
pub trait ManagedService: Send + Sync + Any {
    /// Finishes setup once all dependencies are live.
    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Releases resources. If `terminate` is true, skip graceful cleanup.
    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ContainerPhase
// ---------------------------------------------------------------------------

/// Container-wide lifecycle phase.
///
/// State machine: Composed -> Starting -> Running -> Stopping -> Stopped,
/// with Starting -> Failed when construction aborts. A stopped or failed
/// container may be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerPhase {
    /// Plan resolved, nothing constructed yet.
    Composed,
    /// Services are being constructed in plan order.
    Starting,
    /// Every service is live; `resolve` succeeds.
    Running,
    /// Services are being torn down in reverse order.
    Stopping,
    /// Teardown finished.
    Stopped,
    /// Startup aborted and was rolled back.
    Failed,
}

impl ContainerPhase {
    /// Whether `start` may be called from this phase.
    #[must_use]
    pub fn can_start(self) -> bool {
        matches!(self, Self::Composed | Self::Stopped | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// PhaseTracker
// ---------------------------------------------------------------------------

/// Holds the current [`ContainerPhase`] and broadcasts transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    current: Arc<ArcSwap<ContainerPhase>>,
    changes: watch::Sender<ContainerPhase>,
}

impl PhaseTracker {
    /// Creates a tracker in the `Composed` phase.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _rx) = watch::channel(ContainerPhase::Composed);
        Self {
            current: Arc::new(ArcSwap::from_pointee(ContainerPhase::Composed)),
            changes,
        }
    }

    #[must_use]
    pub fn get(&self) -> ContainerPhase {
        **self.current.load()
    }

    pub fn set(&self, phase: ContainerPhase) {
        self.current.store(Arc::new(phase));
        // Stored even with no live receivers, so late subscribers see it.
        self.changes.send_replace(phase);
    }

    /// Returns a receiver notified on every phase transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ContainerPhase> {
        self.changes.subscribe()
    }

    /// Shared read handle for components that only poll the phase.
    #[must_use]
    pub fn handle(&self) -> Arc<ArcSwap<ContainerPhase>> {
        Arc::clone(&self.current)
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
