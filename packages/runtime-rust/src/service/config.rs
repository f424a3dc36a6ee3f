use std::time::Duration;

/// Runtime-level configuration shared by the container and its services.
///
/// Controls lifecycle deadlines, teardown mode, and which extensions load.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Name of this bot instance, used in log output.
    pub instance_name: String,
    /// Upper bound on a full `start`, applied by `Container::start_within`.
    pub startup_timeout: Duration,
    /// Passed to every `ManagedService::shutdown` call. `true` skips graceful cleanup.
    pub terminate_on_shutdown: bool,
    /// Extension names skipped by the `ExtensionLoader`.
    pub disabled_extensions: Vec<String>,
    /// Interval at which the job scheduler checks for due jobs.
    pub job_tick_interval: Duration,
}

impl RuntimeConfig {
    /// Whether the extension called `name` is disabled.
    #[must_use]
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_extensions.iter().any(|disabled| disabled == name)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            instance_name: String::from("holobot"),
            startup_timeout: Duration::from_secs(30),
            terminate_on_shutdown: false,
            disabled_extensions: Vec::new(),
            job_tick_interval: Duration::from_secs(1),
        }
    }
}
