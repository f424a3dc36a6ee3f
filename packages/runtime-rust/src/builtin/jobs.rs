//! Periodic job scheduling on a [`BackgroundWorker`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use super::events::{AuditLog, AUDIT_PREFIX};
use crate::service::{BackgroundRunnable, BackgroundWorker, ManagedService, ServiceContext};
use crate::traits::{Clock, Job, JobScheduler, KeyValueStore};

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

struct Scheduled {
    job: Arc<dyn Job>,
    next_due: u64,
}

enum JobTask {
    Trigger {
        name: String,
        done: oneshot::Sender<anyhow::Result<()>>,
    },
}

struct JobRunner {
    clock: Arc<dyn Clock>,
    scheduled: Vec<Scheduled>,
}

impl JobRunner {
    async fn execute(&mut self, index: usize) -> anyhow::Result<()> {
        let entry = &mut self.scheduled[index];
        let result = entry.job.run().await;
        entry.next_due = self
            .clock
            .now_millis()
            .saturating_add(millis(entry.job.period()));
        match &result {
            Ok(()) => debug!(job = entry.job.name(), "job finished"),
            Err(err) => warn!(job = entry.job.name(), error = %err, "job failed"),
        }
        result
    }
}

#[async_trait]
impl BackgroundRunnable for JobRunner {
    type Task = JobTask;

    async fn run(&mut self, task: JobTask) -> anyhow::Result<()> {
        let JobTask::Trigger { name, done } = task;
        let result = match self.scheduled.iter().position(|s| s.job.name() == name) {
            Some(index) => self.execute(index).await,
            None => Err(anyhow::anyhow!("no job named {name}")),
        };
        // The caller may have given up waiting.
        let _ = done.send(result);
        Ok(())
    }

    async fn on_tick(&mut self) -> anyhow::Result<()> {
        let now = self.clock.now_millis();
        for index in 0..self.scheduled.len() {
            if self.scheduled[index].next_due <= now {
                // Failures are logged by `execute`; other jobs still run.
                let _ = self.execute(index).await;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// IntervalScheduler
// ---------------------------------------------------------------------------

/// [`JobScheduler`] running every bound [`Job`] on a worker started in `init`.
///
/// Due jobs are checked once per `RuntimeConfig::job_tick_interval`.
pub struct IntervalScheduler {
    jobs: Vec<Arc<dyn Job>>,
    clock: Arc<dyn Clock>,
    worker: Mutex<Option<BackgroundWorker<JobRunner>>>,
}

impl IntervalScheduler {
    #[must_use]
    pub fn new(jobs: Vec<Arc<dyn Job>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs,
            clock,
            worker: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ManagedService for IntervalScheduler {
    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        let now = self.clock.now_millis();
        let runner = JobRunner {
            clock: Arc::clone(&self.clock),
            scheduled: self
                .jobs
                .iter()
                .map(|job| Scheduled {
                    job: Arc::clone(job),
                    next_due: now.saturating_add(millis(job.period())),
                })
                .collect(),
        };
        let worker = BackgroundWorker::start("jobs", runner, ctx.config.job_tick_interval)?;
        *self.worker.lock().await = Some(worker);
        info!(jobs = self.jobs.len(), "job scheduler started");
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        if let Some(mut worker) = self.worker.lock().await.take() {
            worker.stop().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobScheduler for IntervalScheduler {
    fn jobs(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|job| job.name()).collect()
    }

    async fn trigger(&self, name: &str) -> anyhow::Result<()> {
        let (done, result) = oneshot::channel();
        {
            let worker = self.worker.lock().await;
            let Some(worker) = worker.as_ref() else {
                anyhow::bail!("job scheduler is not running");
            };
            worker
                .submit(JobTask::Trigger {
                    name: name.to_owned(),
                    done,
                })
                .await?;
        }
        result
            .await
            .map_err(|_| anyhow::anyhow!("job scheduler stopped before {name} finished"))?
    }
}

// ---------------------------------------------------------------------------
// AuditRetention
// ---------------------------------------------------------------------------

/// Deletes audit records older than the retention window.
pub struct AuditRetention {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl AuditRetention {
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            store,
            clock,
            retention,
        }
    }

    /// Deletes expired records and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn sweep(&self) -> anyhow::Result<usize> {
        let cutoff = self.clock.now_millis().saturating_sub(millis(self.retention));
        let mut removed = 0;
        for key in self.store.keys(AUDIT_PREFIX).await? {
            if AuditLog::timestamp_of(&key).is_some_and(|at| at < cutoff)
                && self.store.delete(&key).await?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl ManagedService for AuditRetention {}

#[async_trait]
impl Job for AuditRetention {
    fn name(&self) -> &'static str {
        "audit-retention"
    }

    fn period(&self) -> Duration {
        Duration::from_secs(60 * 60)
    }

    async fn run(&self) -> anyhow::Result<()> {
        let removed = self.sweep().await?;
        debug!(removed, "audit retention sweep");
        Ok(())
    }
}
