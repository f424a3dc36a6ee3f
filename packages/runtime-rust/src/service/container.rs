//! Container: executes an initialization plan.
//!
//! Construction is sequential in plan order, so every dependency is live
//! (constructed and initialized) before its first dependent's factory runs.
//! Teardown walks the plan backwards and is fail-soft: every live service
//! gets its `shutdown` call even when an earlier one fails.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, info_span, warn, Instrument};

use holobot_core::{
    ContractId, GraphSnapshot, ImplementationId, InitializationPlan, NodeId, NodeState,
    ServiceNode,
};

use super::catalog::Provider;
use super::dependencies::{every, exactly_one, Dependencies, ExportHandle};
use super::error::{AggregateError, ContainerError, StartupError, TeardownFailure};
use super::lifecycle::{ContainerPhase, ManagedService, PhaseTracker, ServiceContext};

/// A live service and the exports cast from it.
struct Instance {
    service: Arc<dyn ManagedService>,
    exports: Vec<(ContractId, ExportHandle)>,
}

impl Instance {
    fn export(&self, contract: ContractId) -> Option<ExportHandle> {
        self.exports
            .iter()
            .find(|(exported, _)| *exported == contract)
            .map(|(_, handle)| handle.clone())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Owns a resolved plan and the services constructed from it.
///
/// Lifecycle operations (`start`, `start_within`, `shutdown`) are serialized;
/// `resolve` is lock-free with respect to them and only succeeds while the
/// container is [`ContainerPhase::Running`].
pub struct Container {
    plan: InitializationPlan,
    /// Indexed by `NodeId`.
    providers: Vec<Provider>,
    /// Indexed by `NodeId`.
    states: RwLock<Vec<NodeState>>,
    instances: DashMap<NodeId, Instance>,
    phase: PhaseTracker,
    lifecycle: Mutex<()>,
}

impl Container {
    pub(crate) fn new(plan: InitializationPlan, providers: Vec<Provider>) -> Self {
        let states = vec![NodeState::Unresolved; plan.len()];
        Self {
            plan,
            providers,
            states: RwLock::new(states),
            instances: DashMap::new(),
            phase: PhaseTracker::new(),
            lifecycle: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn plan(&self) -> &InitializationPlan {
        &self.plan
    }

    /// Serializable view of the plan, for diagnostics output.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from(&self.plan)
    }

    #[must_use]
    pub fn phase(&self) -> ContainerPhase {
        self.phase.get()
    }

    /// Receiver notified on every phase transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ContainerPhase> {
        self.phase.subscribe()
    }

    /// Current state of `implementation`, if it is part of the plan.
    #[must_use]
    pub fn state(&self, implementation: ImplementationId) -> Option<NodeState> {
        let id = self.plan.graph().find(implementation)?;
        Some(self.states.read()[id.index()])
    }

    /// Every node with its state, in construction order.
    #[must_use]
    pub fn states(&self) -> Vec<(ImplementationId, NodeState)> {
        let states = self.states.read();
        self.plan
            .iter()
            .map(|node| (node.implementation(), states[node.id().index()]))
            .collect()
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Constructs and initializes every service in plan order.
    ///
    /// On the first failure, nothing further is constructed, the services
    /// already live are torn down in reverse order, and the container moves
    /// to [`ContainerPhase::Failed`]. The failed node stays `Failed`; its
    /// transitive dependents stay `Unresolved` and are listed in
    /// [`StartupError::blocked`].
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` if the container is starting or running, otherwise
    /// the construction failure with its fallout.
    pub async fn start(&self, ctx: &ServiceContext) -> Result<(), StartupError> {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.phase.get().can_start() {
            return Err(ContainerError::AlreadyStarted.into());
        }

        self.states.write().fill(NodeState::Unresolved);
        self.phase.set(ContainerPhase::Starting);
        info!(
            instance = %ctx.config.instance_name,
            services = self.plan.len(),
            "starting container"
        );
        let start = Instant::now();

        for node in self.plan.iter() {
            if let Err(cause) = self.construct(node, ctx).await {
                let blocked = self.blocked_by(node.id());
                error!(
                    service = %node.implementation(),
                    error = %cause,
                    blocked = blocked.len(),
                    "startup aborted, rolling back"
                );
                let rollback = self.teardown(ctx.config.terminate_on_shutdown).await.err();
                self.phase.set(ContainerPhase::Failed);
                return Err(StartupError {
                    cause,
                    blocked,
                    rollback,
                });
            }
        }

        self.phase.set(ContainerPhase::Running);
        info!(
            services = self.plan.len(),
            duration_ms = elapsed_ms(start),
            "container running"
        );
        Ok(())
    }

    /// [`start`](Self::start) bounded by `deadline`.
    ///
    /// When the deadline passes, the in-flight construction is abandoned and
    /// marked `Failed`, and everything already live is rolled back.
    ///
    /// # Errors
    ///
    /// `StartupTimeout` on expiry, otherwise whatever `start` returns.
    pub async fn start_within(
        &self,
        ctx: &ServiceContext,
        deadline: Duration,
    ) -> Result<(), StartupError> {
        if let Ok(result) = tokio::time::timeout(deadline, self.start(ctx)).await {
            return result;
        }

        #[allow(clippy::cast_possible_truncation)]
        let deadline_ms = deadline.as_millis() as u64;
        warn!(deadline_ms, "startup deadline exceeded, rolling back");

        let _lifecycle = self.lifecycle.lock().await;
        let mut in_flight = Vec::new();
        {
            let mut states = self.states.write();
            for &id in self.plan.order() {
                if states[id.index()] == NodeState::Resolving {
                    states[id.index()] = NodeState::Failed;
                    in_flight.push(id);
                }
            }
        }
        let blocked = in_flight
            .into_iter()
            .flat_map(|id| self.blocked_by(id))
            .collect();
        let rollback = self.teardown(ctx.config.terminate_on_shutdown).await.err();
        self.phase.set(ContainerPhase::Failed);

        Err(StartupError {
            cause: ContainerError::StartupTimeout(deadline),
            blocked,
            rollback,
        })
    }

    /// Tears every live service down in reverse construction order.
    ///
    /// Each `shutdown` failure is logged and collected; the remaining
    /// services are still shut down. Afterwards every node is `Unresolved`,
    /// no instance is held, and the container is `Stopped`. Calling this on
    /// a container that is not running is a no-op.
    ///
    /// # Errors
    ///
    /// An [`AggregateError`] listing every failed `shutdown`, in teardown order.
    pub async fn shutdown(&self, terminate: bool) -> Result<(), AggregateError> {
        let _lifecycle = self.lifecycle.lock().await;
        let phase = self.phase.get();
        if phase != ContainerPhase::Running {
            debug!(?phase, "shutdown skipped, container not running");
            return Ok(());
        }

        self.phase.set(ContainerPhase::Stopping);
        info!(services = self.instances.len(), terminate, "stopping container");
        let result = self.teardown(terminate).await;
        self.phase.set(ContainerPhase::Stopped);

        match &result {
            Ok(()) => info!("container stopped"),
            Err(err) => warn!(failed = err.failures.len(), "container stopped with teardown failures"),
        }
        result
    }

    // -- Resolution ---------------------------------------------------------

    /// The single live provider of contract `C`.
    ///
    /// # Errors
    ///
    /// `ContractNotResolved` unless the container is running and `C` has a
    /// provider; `AmbiguousContract` if it has several.
    pub fn resolve<C>(&self) -> Result<Arc<C>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = ContractId::of::<C>();
        exactly_one(contract, &self.live_exports(contract)?)
    }

    /// Every live provider of contract `C`, in binding order.
    ///
    /// # Errors
    ///
    /// `ContractNotResolved` unless the container is running and `C` has at
    /// least one provider.
    pub fn resolve_all<C>(&self) -> Result<Vec<Arc<C>>, ContainerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = ContractId::of::<C>();
        every(contract, &self.live_exports(contract)?)
    }

    fn live_exports(&self, contract: ContractId) -> Result<Vec<ExportHandle>, ContainerError> {
        if self.phase.get() != ContainerPhase::Running {
            return Err(ContainerError::ContractNotResolved { contract });
        }
        let handles = self.exports_of(contract);
        if handles.is_empty() {
            return Err(ContainerError::ContractNotResolved { contract });
        }
        Ok(handles)
    }

    /// Exports of `contract` from constructed providers, in binding order.
    fn exports_of(&self, contract: ContractId) -> Vec<ExportHandle> {
        self.plan
            .graph()
            .providers_of(contract)
            .iter()
            .filter_map(|id| {
                self.instances
                    .get(id)
                    .and_then(|instance| instance.export(contract))
            })
            .collect()
    }

    // -- Internals ----------------------------------------------------------

    fn set_state(&self, id: NodeId, state: NodeState) {
        self.states.write()[id.index()] = state;
    }

    async fn construct(
        &self,
        node: &ServiceNode,
        ctx: &ServiceContext,
    ) -> Result<(), ContainerError> {
        let id = node.id();
        let implementation = node.implementation();
        self.set_state(id, NodeState::Resolving);

        let span = info_span!(
            "construct",
            service = implementation.short_name(),
            position = self.plan.position(id),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async {
            let start = Instant::now();
            let result = self.build_instance(node, ctx).await;
            let duration_ms = elapsed_ms(start);
            let outcome = if result.is_ok() { "ok" } else { "error" };
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current().record("outcome", outcome);
            debug!(duration_ms, outcome, "construction complete");

            match result {
                Ok(instance) => {
                    self.instances.insert(id, instance);
                    self.set_state(id, NodeState::Resolved);
                    Ok(())
                }
                Err(source) => {
                    self.set_state(id, NodeState::Failed);
                    Err(ContainerError::ConstructionFailed {
                        implementation,
                        source,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn build_instance(
        &self,
        node: &ServiceNode,
        ctx: &ServiceContext,
    ) -> anyhow::Result<Instance> {
        let mut deps = Dependencies::new(node.implementation());
        for dependency in node.dependencies() {
            deps.insert(dependency, self.exports_of(dependency.contract));
        }

        let constructed = self.providers[node.id().index()].construct(deps).await?;
        constructed.service.init(ctx).await?;
        Ok(Instance {
            service: constructed.service,
            exports: constructed.exports,
        })
    }

    /// One `DependencyFailed` per transitive dependent of `failed`, in plan order.
    fn blocked_by(&self, failed: NodeId) -> Vec<ContainerError> {
        let graph = self.plan.graph();
        let mut reached = vec![false; graph.len()];
        let mut queue: VecDeque<NodeId> = graph.dependents_of(failed).iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if std::mem::replace(&mut reached[id.index()], true) {
                continue;
            }
            queue.extend(graph.dependents_of(id).iter().copied());
        }

        let failed = graph.node(failed).implementation();
        self.plan
            .iter()
            .filter(|node| reached[node.id().index()])
            .map(|node| ContainerError::DependencyFailed {
                failed,
                dependent: node.implementation(),
            })
            .collect()
    }

    /// Shuts down every held instance in reverse plan order, fail-soft.
    async fn teardown(&self, terminate: bool) -> Result<(), AggregateError> {
        let mut failures = Vec::new();

        for node in self.plan.teardown() {
            let Some((id, instance)) = self.instances.remove(&node.id()) else {
                continue;
            };
            let implementation = node.implementation();
            let span = info_span!("teardown", service = implementation.short_name(), terminate);

            match instance.service.shutdown(terminate).instrument(span).await {
                Ok(()) => debug!(service = %implementation, "service stopped"),
                Err(source) => {
                    warn!(service = %implementation, error = %source, "service shutdown failed");
                    failures.push(TeardownFailure {
                        implementation,
                        source,
                    });
                }
            }
            self.set_state(id, NodeState::Unresolved);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateError { failures })
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("phase", &self.phase.get())
            .field("services", &self.plan.len())
            .field("live", &self.instances.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use holobot_core::CompositionError;

    use super::*;
    use crate::service::catalog::ServiceCatalog;
    use crate::service::config::RuntimeConfig;

    type Log = Arc<parking_lot::Mutex<Vec<String>>>;

    trait Storage: Send + Sync {
        fn name(&self) -> &'static str;
    }
    trait Scheduler: Send + Sync {}
    trait Listener: Send + Sync {
        fn name(&self) -> &'static str;
    }
    trait Metrics: Send + Sync {}

    /// Test service that records its lifecycle calls. `N` only makes each
    /// record a distinct implementation type.
    struct Recorder<const N: usize> {
        name: &'static str,
        log: Log,
        fail_init: bool,
        fail_shutdown: bool,
    }

    #[async_trait]
    impl<const N: usize> ManagedService for Recorder<N> {
        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("init:{}", self.name));
            if self.fail_init {
                anyhow::bail!("{} refused to start", self.name);
            }
            Ok(())
        }

        async fn shutdown(&self, terminate: bool) -> anyhow::Result<()> {
            self.log
                .lock()
                .push(format!("shutdown:{}:{terminate}", self.name));
            if self.fail_shutdown {
                anyhow::bail!("{} did not stop", self.name);
            }
            Ok(())
        }
    }

    impl<const N: usize> Storage for Recorder<N> {
        fn name(&self) -> &'static str {
            self.name
        }
    }
    impl<const N: usize> Scheduler for Recorder<N> {}
    impl<const N: usize> Listener for Recorder<N> {
        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn recorder<const N: usize>(
        name: &'static str,
        log: &Log,
    ) -> impl Fn(&Dependencies) -> anyhow::Result<Recorder<N>> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_: &Dependencies| {
            Ok(Recorder {
                name,
                log: Arc::clone(&log),
                fail_init: false,
                fail_shutdown: false,
            })
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().clone()
    }

    /// Storage <- Scheduler, with Scheduler as the root.
    fn scheduler_container(log: &Log) -> Container {
        let mut catalog = ServiceCatalog::new();
        catalog
            .provide::<Recorder<1>>()
            .requires::<dyn Storage>()
            .exports::<dyn Scheduler>(|s| s)
            .value(recorder("cron", log))
            .unwrap();
        catalog
            .provide::<Recorder<0>>()
            .exports::<dyn Storage>(|s| s)
            .value(recorder("sql", log))
            .unwrap();
        catalog
            .compose(&[ContractId::of::<dyn Scheduler>()])
            .unwrap()
    }

    #[tokio::test]
    async fn start_and_shutdown_follow_the_plan() {
        let log = Log::default();
        let container = scheduler_container(&log);
        let ctx = ServiceContext::default();

        container.start(&ctx).await.unwrap();
        assert_eq!(container.phase(), ContainerPhase::Running);
        assert!(container.resolve::<dyn Scheduler>().is_ok());
        assert_eq!(container.resolve::<dyn Storage>().unwrap().name(), "sql");
        assert!(container
            .states()
            .iter()
            .all(|(_, state)| *state == NodeState::Resolved));

        container.shutdown(false).await.unwrap();
        assert_eq!(
            entries(&log),
            vec![
                "init:sql",
                "init:cron",
                "shutdown:cron:false",
                "shutdown:sql:false",
            ]
        );
        assert_eq!(container.phase(), ContainerPhase::Stopped);
        assert!(container
            .states()
            .iter()
            .all(|(_, state)| *state == NodeState::Unresolved));
    }

    #[tokio::test]
    async fn resolve_requires_a_running_container() {
        let log = Log::default();
        let container = scheduler_container(&log);

        let err = container.resolve::<dyn Storage>().err().unwrap();
        assert!(matches!(err, ContainerError::ContractNotResolved { .. }));

        container.start(&ServiceContext::default()).await.unwrap();
        container.shutdown(true).await.unwrap();
        assert!(matches!(
            container.resolve_all::<dyn Storage>(),
            Err(ContainerError::ContractNotResolved { .. })
        ));
        assert!(entries(&log).contains(&"shutdown:sql:true".to_string()));
    }

    #[tokio::test]
    async fn fan_out_is_injected_in_binding_order() {
        struct Dispatcher {
            listeners: Vec<Arc<dyn Listener>>,
        }
        impl ManagedService for Dispatcher {}

        let log = Log::default();
        let mut catalog = ServiceCatalog::new();
        catalog
            .provide::<Recorder<2>>()
            .exports::<dyn Listener>(|s| s)
            .value(recorder("welcome", &log))
            .unwrap();
        catalog
            .provide::<Recorder<0>>()
            .exports::<dyn Listener>(|s| s)
            .value(recorder("audit", &log))
            .unwrap();
        catalog
            .provide::<Recorder<1>>()
            .exports::<dyn Listener>(|s| s)
            .value(recorder("leveling", &log))
            .unwrap();
        catalog
            .provide::<Dispatcher>()
            .requires::<dyn Listener>()
            .exports_self()
            .value(|deps| {
                Ok(Dispatcher {
                    listeners: deps.all::<dyn Listener>()?,
                })
            })
            .unwrap();

        let container = catalog.compose(&[ContractId::of::<Dispatcher>()]).unwrap();
        container.start(&ServiceContext::default()).await.unwrap();

        let dispatcher = container.resolve::<Dispatcher>().unwrap();
        let names: Vec<_> = dispatcher.listeners.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["welcome", "audit", "leveling"]);

        assert!(matches!(
            container.resolve::<dyn Listener>(),
            Err(ContainerError::AmbiguousContract { count: 3, .. })
        ));
        assert_eq!(container.resolve_all::<dyn Listener>().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn absent_optional_dependency_is_none() {
        struct Reporter {
            metrics: Option<Arc<dyn Metrics>>,
        }
        impl ManagedService for Reporter {}

        let mut catalog = ServiceCatalog::new();
        catalog
            .provide::<Reporter>()
            .optional::<dyn Metrics>()
            .exports_self()
            .value(|deps| {
                Ok(Reporter {
                    metrics: deps.maybe::<dyn Metrics>()?,
                })
            })
            .unwrap();

        let container = catalog.compose(&[ContractId::of::<Reporter>()]).unwrap();
        container.start(&ServiceContext::default()).await.unwrap();
        assert!(container.resolve::<Reporter>().unwrap().metrics.is_none());
    }

    #[tokio::test]
    async fn factory_failure_rolls_back_and_blocks_dependents() {
        struct Audit;
        impl ManagedService for Audit {}
        impl Listener for Audit {
            fn name(&self) -> &'static str {
                "audit"
            }
        }

        let log = Log::default();
        let mut catalog = ServiceCatalog::new();
        catalog
            .provide::<Recorder<0>>()
            .exports::<dyn Storage>(|s| s)
            .value(recorder("sql", &log))
            .unwrap();
        catalog
            .provide::<Recorder<1>>()
            .requires::<dyn Storage>()
            .exports::<dyn Scheduler>(|s| s)
            .value(|_| -> anyhow::Result<Recorder<1>> { anyhow::bail!("cron table missing") })
            .unwrap();
        catalog
            .provide::<Audit>()
            .requires::<dyn Scheduler>()
            .exports::<dyn Listener>(|s| s)
            .value(|_| Ok(Audit))
            .unwrap();

        let container = catalog.compose(&[ContractId::of::<dyn Listener>()]).unwrap();
        let err = container.start(&ServiceContext::default()).await.unwrap_err();

        assert!(matches!(
            err.cause,
            ContainerError::ConstructionFailed { implementation, .. }
                if implementation == ImplementationId::of::<Recorder<1>>()
        ));
        assert_eq!(err.blocked.len(), 1);
        assert!(matches!(
            err.blocked[0],
            ContainerError::DependencyFailed { failed, dependent }
                if failed == ImplementationId::of::<Recorder<1>>()
                    && dependent == ImplementationId::of::<Audit>()
        ));
        assert!(err.rollback.is_none());

        assert_eq!(entries(&log), vec!["init:sql", "shutdown:sql:false"]);
        assert_eq!(container.phase(), ContainerPhase::Failed);
        assert_eq!(
            container.state(ImplementationId::of::<Recorder<1>>()),
            Some(NodeState::Failed)
        );
        assert_eq!(
            container.state(ImplementationId::of::<Audit>()),
            Some(NodeState::Unresolved)
        );
        assert_eq!(
            container.state(ImplementationId::of::<Recorder<0>>()),
            Some(NodeState::Unresolved)
        );
    }

    #[tokio::test]
    async fn init_failure_is_a_construction_failure() {
        let log = Log::default();
        let mut catalog = ServiceCatalog::new();
        let failing = Arc::clone(&log);
        catalog
            .provide::<Recorder<0>>()
            .exports::<dyn Storage>(|s| s)
            .value(move |_| {
                Ok(Recorder {
                    name: "sql",
                    log: Arc::clone(&failing),
                    fail_init: true,
                    fail_shutdown: false,
                })
            })
            .unwrap();

        let container = catalog.compose(&[ContractId::of::<dyn Storage>()]).unwrap();
        let err = container.start(&ServiceContext::default()).await.unwrap_err();
        assert!(err.cause.to_string().contains("sql refused to start"));
        assert!(err.blocked.is_empty());
    }

    fn listener<const N: usize>(
        catalog: &mut ServiceCatalog,
        name: &'static str,
        log: &Log,
        fail_shutdown: bool,
    ) {
        let log = Arc::clone(log);
        catalog
            .provide::<Recorder<N>>()
            .exports::<dyn Listener>(|s| s)
            .value(move |_| {
                Ok(Recorder {
                    name,
                    log: Arc::clone(&log),
                    fail_init: false,
                    fail_shutdown,
                })
            })
            .unwrap();
    }

    #[tokio::test]
    async fn teardown_failures_are_collected_without_stopping() {
        let log = Log::default();
        let mut catalog = ServiceCatalog::new();
        listener::<10>(&mut catalog, "a", &log, false);
        listener::<11>(&mut catalog, "b", &log, true);
        listener::<12>(&mut catalog, "c", &log, false);
        listener::<13>(&mut catalog, "d", &log, true);

        let container = catalog.compose(&[ContractId::of::<dyn Listener>()]).unwrap();
        container.start(&ServiceContext::default()).await.unwrap();
        let err = container.shutdown(false).await.unwrap_err();

        assert_eq!(
            err.implementations(),
            vec![
                ImplementationId::of::<Recorder<13>>(),
                ImplementationId::of::<Recorder<11>>(),
            ]
        );
        let shutdowns: Vec<_> = entries(&log)
            .into_iter()
            .filter(|e| e.starts_with("shutdown:"))
            .collect();
        assert_eq!(
            shutdowns,
            vec![
                "shutdown:d:false",
                "shutdown:c:false",
                "shutdown:b:false",
                "shutdown:a:false",
            ]
        );
        assert_eq!(container.phase(), ContainerPhase::Stopped);
        assert!(container
            .states()
            .iter()
            .all(|(_, state)| *state == NodeState::Unresolved));
    }

    #[tokio::test]
    async fn second_start_is_rejected_and_restart_works() {
        let log = Log::default();
        let container = scheduler_container(&log);
        let ctx = ServiceContext::default();

        container.start(&ctx).await.unwrap();
        let err = container.start(&ctx).await.unwrap_err();
        assert!(matches!(err.cause, ContainerError::AlreadyStarted));

        container.shutdown(false).await.unwrap();
        container.start(&ctx).await.unwrap();
        assert_eq!(container.phase(), ContainerPhase::Running);
        assert_eq!(
            entries(&log)
                .iter()
                .filter(|e| e.as_str() == "init:sql")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn shutdown_before_start_is_a_noop() {
        let log = Log::default();
        let container = scheduler_container(&log);
        container.shutdown(false).await.unwrap();
        assert_eq!(container.phase(), ContainerPhase::Composed);
        assert!(entries(&log).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_within_times_out_and_rolls_back() {
        struct Slow;
        impl ManagedService for Slow {}

        let log = Log::default();
        let mut catalog = ServiceCatalog::new();
        catalog
            .provide::<Recorder<0>>()
            .exports::<dyn Storage>(|s| s)
            .value(recorder("sql", &log))
            .unwrap();
        catalog
            .provide::<Slow>()
            .requires::<dyn Storage>()
            .exports_self()
            .factory(|_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Slow)
            })
            .unwrap();
        catalog
            .provide::<Recorder<1>>()
            .requires::<Slow>()
            .exports::<dyn Scheduler>(|s| s)
            .value(recorder("cron", &log))
            .unwrap();

        let container = catalog.compose(&[ContractId::of::<dyn Scheduler>()]).unwrap();
        let err = container
            .start_within(&ServiceContext::default(), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err.cause, ContainerError::StartupTimeout(d) if d == Duration::from_millis(100)));
        assert_eq!(err.blocked.len(), 1);
        assert_eq!(entries(&log), vec!["init:sql", "shutdown:sql:false"]);
        assert_eq!(container.state(ImplementationId::of::<Slow>()), Some(NodeState::Failed));
        assert_eq!(container.phase(), ContainerPhase::Failed);
    }

    #[tokio::test]
    async fn terminate_flag_comes_from_config_on_rollback() {
        let log = Log::default();
        let mut catalog = ServiceCatalog::new();
        catalog
            .provide::<Recorder<0>>()
            .exports::<dyn Storage>(|s| s)
            .value(recorder("sql", &log))
            .unwrap();
        catalog
            .provide::<Recorder<1>>()
            .requires::<dyn Storage>()
            .exports::<dyn Scheduler>(|s| s)
            .value(|_| -> anyhow::Result<Recorder<1>> { anyhow::bail!("boom") })
            .unwrap();

        let container = catalog.compose(&[ContractId::of::<dyn Scheduler>()]).unwrap();
        let ctx = ServiceContext::new(RuntimeConfig {
            terminate_on_shutdown: true,
            ..RuntimeConfig::default()
        });
        container.start(&ctx).await.unwrap_err();
        assert_eq!(entries(&log), vec!["init:sql", "shutdown:sql:true"]);
    }

    #[tokio::test]
    async fn phase_changes_are_broadcast() {
        let log = Log::default();
        let container = scheduler_container(&log);
        let mut phases = container.subscribe();

        container.start(&ServiceContext::default()).await.unwrap();
        assert_eq!(*phases.borrow_and_update(), ContainerPhase::Running);
        container.shutdown(false).await.unwrap();
        assert_eq!(*phases.borrow_and_update(), ContainerPhase::Stopped);
    }

    #[tokio::test]
    async fn subscribing_after_start_sees_running() {
        let log = Log::default();
        let container = scheduler_container(&log);
        container.start(&ServiceContext::default()).await.unwrap();

        let phases = container.subscribe();
        assert_eq!(*phases.borrow(), ContainerPhase::Running);
    }

    #[test]
    fn cyclic_catalog_never_becomes_a_container() {
        struct X;
        impl ManagedService for X {}
        struct Y;
        impl ManagedService for Y {}

        let mut catalog = ServiceCatalog::new();
        catalog
            .provide::<X>()
            .requires::<Y>()
            .exports_self()
            .value(|_| Ok(X))
            .unwrap();
        catalog
            .provide::<Y>()
            .requires::<X>()
            .exports_self()
            .value(|_| Ok(Y))
            .unwrap();

        let err = catalog.compose(&[ContractId::of::<X>()]).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::Composition(CompositionError::CyclicGraph { ref nodes })
                if nodes.len() == 2
        ));
    }

    #[test]
    fn snapshot_reflects_plan() {
        let log = Log::default();
        let container = scheduler_container(&log);
        let snapshot = container.snapshot();
        assert_eq!(snapshot.order, container.plan().implementations());
        assert_eq!(snapshot.edges.len(), 1);
    }
}
