//! Platform contracts shared by extensions.
//!
//! Feature code depends on these traits, never on the concrete services in
//! `builtin`, so any extension may bind its own implementation instead.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Wall-clock source. Injected so jobs and listeners stay testable.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// String key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn put(&self, key: &str, value: String) -> anyhow::Result<()>;

    /// Removes `key`. Returns whether it was present.
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;

    /// Keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An event raised by the chat gateway or by another service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotEvent {
    /// Event kind, e.g. `"member_joined"`.
    pub kind: String,
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl BotEvent {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            guild_id: None,
            payload: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn in_guild(mut self, guild_id: u64) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Receives published events. Any number may be bound.
#[async_trait]
pub trait EventListener: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this listener wants events of `kind`.
    fn accepts(&self, _kind: &str) -> bool {
        true
    }

    async fn handle(&self, event: &BotEvent) -> anyhow::Result<()>;
}

/// Outcome of one [`EventBus::publish`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Listeners that handled the event.
    pub delivered: Vec<&'static str>,
    /// Listeners whose handler returned an error.
    pub failed: Vec<&'static str>,
}

/// Fans events out to every interested listener.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: BotEvent) -> DispatchReport;
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Periodic background work. Any number may be bound.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    /// Time between runs.
    fn period(&self) -> Duration;

    async fn run(&self) -> anyhow::Result<()>;
}

/// Runs bound [`Job`]s on their periods.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Names of the scheduled jobs, in binding order.
    fn jobs(&self) -> Vec<&'static str>;

    /// Runs the job called `name` now, outside its schedule.
    async fn trigger(&self, name: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_payload() {
        let event = BotEvent::new("member_joined")
            .in_guild(42)
            .with_payload(serde_json::json!({ "user": 7 }));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "member_joined");
        assert_eq!(json["guild_id"], 42);
        assert_eq!(json["payload"]["user"], 7);

        let back: BotEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn payload_defaults_to_null() {
        let event: BotEvent = serde_json::from_str(r#"{"kind":"ready","guild_id":null}"#).unwrap();
        assert!(event.payload.is_null());
    }
}
