//! Event fan-out and the audit log listener.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::service::ManagedService;
use crate::traits::{BotEvent, Clock, DispatchReport, EventBus, EventListener, KeyValueStore};

/// Key prefix of audit records in the [`KeyValueStore`].
pub const AUDIT_PREFIX: &str = "audit:";

// ---------------------------------------------------------------------------
// EventDispatcher
// ---------------------------------------------------------------------------

/// [`EventBus`] delivering to every bound listener in binding order.
///
/// Delivery is fail-soft: a failing listener is reported and the rest still
/// receive the event.
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(listeners: Vec<Arc<dyn EventListener>>) -> Self {
        Self { listeners }
    }

    /// Listener names in delivery order.
    #[must_use]
    pub fn listeners(&self) -> Vec<&'static str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }
}

impl ManagedService for EventDispatcher {}

#[async_trait]
impl EventBus for EventDispatcher {
    async fn publish(&self, event: BotEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        for listener in self.listeners.iter().filter(|l| l.accepts(&event.kind)) {
            match listener.handle(&event).await {
                Ok(()) => report.delivered.push(listener.name()),
                Err(err) => {
                    warn!(listener = listener.name(), kind = %event.kind, error = %err, "listener failed");
                    report.failed.push(listener.name());
                }
            }
        }
        debug!(
            kind = %event.kind,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "event published"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AuditRecord<'a> {
    at: u64,
    #[serde(flatten)]
    event: &'a BotEvent,
}

/// Listener that records every event in the key-value store.
pub struct AuditLog {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl AuditLog {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            sequence: AtomicU64::new(0),
        }
    }

    /// Store key for a record written at `at`. Keys sort by time.
    #[must_use]
    pub fn key(at: u64, sequence: u64) -> String {
        format!("{AUDIT_PREFIX}{at:020}:{sequence:06}")
    }

    /// Timestamp encoded in an audit key.
    #[must_use]
    pub fn timestamp_of(key: &str) -> Option<u64> {
        key.strip_prefix(AUDIT_PREFIX)?
            .split(':')
            .next()?
            .parse()
            .ok()
    }
}

impl ManagedService for AuditLog {}

#[async_trait]
impl EventListener for AuditLog {
    fn name(&self) -> &'static str {
        "audit-log"
    }

    async fn handle(&self, event: &BotEvent) -> anyhow::Result<()> {
        let at = self.clock.now_millis();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let record = serde_json::to_string(&AuditRecord { at, event })?;
        self.store.put(&Self::key(at, sequence), record).await
    }
}
