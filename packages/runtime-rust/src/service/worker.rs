//! Background worker for services that own periodic or queued work.
//!
//! A `BackgroundWorker<R>` drives a `BackgroundRunnable` on its own tokio
//! task: queued tasks arrive over an mpsc channel, and `on_tick` fires at a
//! fixed interval. Services start their worker in `init` and stop it in
//! `shutdown`, so the worker never outlives the container that owns it.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

const QUEUE_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Work executed by a [`BackgroundWorker`].
///
/// Errors from `run` and `on_tick` are logged by the worker and never stop
/// the loop.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// Queued task type.
    type Task: Send + 'static;

    /// Handles one queued task.
    async fn run(&mut self, task: Self::Task) -> anyhow::Result<()>;

    /// Called once per tick interval.
    async fn on_tick(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once after the loop exits.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Handle to a running worker task.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    name: &'static str,
    tx: Option<mpsc::Sender<R::Task>>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the worker loop. The first tick fires one `tick` after start.
    ///
    /// # Errors
    ///
    /// Fails without spawning anything if `tick` is zero.
    pub fn start(name: &'static str, mut runnable: R, tick: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!tick.is_zero(), "worker {name} needs a non-zero tick interval");
        let (tx, mut rx) = mpsc::channel::<R::Task>(QUEUE_CAPACITY);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(worker = name, tick = ?tick, "worker started");

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        let Some(task) = task else { break };
                        if let Err(err) = runnable.run(task).await {
                            warn!(worker = name, error = %err, "task failed");
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(err) = runnable.on_tick().await {
                            warn!(worker = name, error = %err, "tick failed");
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }

            runnable.shutdown().await;
            debug!(worker = name, "worker stopped");
        });

        Ok(Self {
            name,
            tx: Some(tx),
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the worker loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Queues a task.
    ///
    /// # Errors
    ///
    /// Fails if the worker was stopped or its loop has exited.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        let Some(tx) = &self.tx else {
            anyhow::bail!("worker {} is not running", self.name);
        };
        tx.send(task)
            .await
            .map_err(|_| anyhow::anyhow!("worker {} queue closed", self.name))
    }

    /// Stops the loop and waits for `BackgroundRunnable::shutdown` to finish.
    ///
    /// Queued tasks that were not picked up yet are dropped.
    ///
    /// # Errors
    ///
    /// Fails if the worker task panicked.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|err| anyhow::anyhow!("worker {} panicked: {err}", self.name))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Default, Clone)]
    struct Counters {
        runs: Arc<AtomicU32>,
        ticks: Arc<AtomicU32>,
        shutdowns: Arc<AtomicU32>,
    }

    struct Counting(Counters);

    #[async_trait]
    impl BackgroundRunnable for Counting {
        type Task = u32;

        async fn run(&mut self, task: u32) -> anyhow::Result<()> {
            self.0.runs.fetch_add(1, Ordering::SeqCst);
            if task == 0 {
                anyhow::bail!("zero is not a task");
            }
            Ok(())
        }

        async fn on_tick(&mut self) -> anyhow::Result<()> {
            self.0.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&mut self) {
            self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tasks_run_and_failures_do_not_stop_the_loop() {
        let counters = Counters::default();
        let mut worker =
            BackgroundWorker::start("test", Counting(counters.clone()), Duration::from_secs(60))
                .unwrap();

        worker.submit(0).await.unwrap();
        worker.submit(1).await.unwrap();
        worker.submit(2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(counters.runs.load(Ordering::SeqCst), 3);
        assert!(worker.is_running());

        worker.stop().await.unwrap();
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!worker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_fire_on_the_interval() {
        let counters = Counters::default();
        let mut worker =
            BackgroundWorker::start("test", Counting(counters.clone()), Duration::from_secs(1))
                .unwrap();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        worker.stop().await.unwrap();

        assert_eq!(counters.ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn submit_after_stop_fails() {
        let mut worker =
            BackgroundWorker::start("test", Counting(Counters::default()), Duration::from_secs(60))
                .unwrap();
        worker.stop().await.unwrap();

        let err = worker.submit(1).await.unwrap_err();
        assert!(err.to_string().contains("not running"));
        assert_eq!(worker.name(), "test");
    }

    #[tokio::test]
    async fn zero_tick_is_rejected() {
        let counters = Counters::default();
        let Err(err) = BackgroundWorker::start("test", Counting(counters.clone()), Duration::ZERO)
        else {
            panic!("a zero tick must not start a worker");
        };
        assert!(err.to_string().contains("non-zero tick"));
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 0);
    }
}
