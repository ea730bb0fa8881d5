use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use sentiment_common::{FailOutcome, WorkerConfig};

use crate::orchestrator::{Orchestrator, RunOutcome};
use crate::traits::{JobStore, TaskQueue};

/// Longest uninterrupted sleep before re-checking the cancel flag.
const CANCEL_CHECK: Duration = Duration::from_millis(500);

/// Consumes analysis tasks from the queue and runs them.
pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    orchestrator: Orchestrator,
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        orchestrator: Orchestrator,
        store: Arc<dyn JobStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            store,
            config,
        }
    }

    /// Claim and run one task. Returns `false` if the queue was empty.
    ///
    /// A run that errors goes back to the queue while attempts remain. Once
    /// they are exhausted the job is marked failed. If the claim expired
    /// mid-run, the result is dropped and the current claimant owns the task.
    pub async fn process_next(&self) -> Result<bool> {
        let Some(task) = self.queue.dequeue().await? else {
            return Ok(false);
        };

        match self.orchestrator.run(&task).await {
            Ok(outcome) => {
                match &outcome {
                    RunOutcome::Completed(_) => {}
                    RunOutcome::Failed(reason) => {
                        info!(task_id = %task.id, job_id = %task.job_id, reason = reason.as_str(), "Task finished with failed job")
                    }
                    RunOutcome::Skipped(status) => {
                        info!(task_id = %task.id, job_id = %task.job_id, %status, "Task skipped")
                    }
                }
                if !self.queue.complete(&task).await? {
                    warn!(task_id = %task.id, job_id = %task.job_id, "Claim expired before completion was recorded");
                }
            }
            Err(e) => match self.queue.fail(&task, &e.to_string()).await? {
                FailOutcome::Requeued => {
                    warn!(
                        task_id = %task.id,
                        job_id = %task.job_id,
                        attempt = task.attempts,
                        max_attempts = task.max_attempts,
                        error = %e,
                        "Task failed, requeued"
                    );
                }
                FailOutcome::Exhausted => {
                    error!(
                        task_id = %task.id,
                        job_id = %task.job_id,
                        attempts = task.attempts,
                        error = %e,
                        "Task failed permanently"
                    );
                    let message = format!("Analysis failed after {} attempts: {e}", task.attempts);
                    if let Err(mark_err) = self.store.mark_failed(task.job_id, &message).await {
                        error!(job_id = %task.job_id, error = %mark_err, "Failed to mark job as failed");
                    }
                }
                FailOutcome::ClaimLost => {
                    warn!(task_id = %task.id, job_id = %task.job_id, error = %e, "Claim expired before failure was recorded");
                }
            },
        }

        Ok(true)
    }

    /// Run until the queue is empty. Returns how many tasks were processed.
    pub async fn drain(&self) -> Result<usize> {
        let mut processed = 0;
        while self.process_next().await? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Run `concurrency` consumer loops plus a stale-task reaper until
    /// `cancel` is set. In-flight tasks finish before this returns.
    pub async fn run(self: Arc<Self>, cancel: Arc<AtomicBool>) {
        info!(
            concurrency = self.config.concurrency,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            lease_secs = self.config.lease.as_secs(),
            "Worker started"
        );

        let mut loops = JoinSet::new();
        for slot in 0..self.config.concurrency {
            let worker = self.clone();
            let cancel = cancel.clone();
            loops.spawn(async move { worker.consume(slot, cancel).await });
        }
        {
            let worker = self.clone();
            let cancel = cancel.clone();
            loops.spawn(async move { worker.reap(cancel).await });
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker loop panicked");
            }
        }
        info!("Worker stopped");
    }

    async fn consume(&self, slot: usize, cancel: Arc<AtomicBool>) {
        while !cancel.load(Ordering::Relaxed) {
            match self.process_next().await {
                Ok(true) => {}
                Ok(false) => sleep_unless_cancelled(self.config.poll_interval, &cancel).await,
                Err(e) => {
                    error!(slot, error = %e, "Queue error");
                    sleep_unless_cancelled(self.config.poll_interval, &cancel).await;
                }
            }
        }
    }

    async fn reap(&self, cancel: Arc<AtomicBool>) {
        while !cancel.load(Ordering::Relaxed) {
            sleep_unless_cancelled(self.config.lease, &cancel).await;
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            match self.queue.requeue_stale(self.config.lease).await {
                Ok(0) => {}
                Ok(n) => warn!(requeued = n, "Requeued stale tasks"),
                Err(e) => error!(error = %e, "Stale task sweep failed"),
            }
        }
    }
}

/// Sleep for `total`, waking early once `cancel` is set.
pub(crate) async fn sleep_unless_cancelled(total: Duration, cancel: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !cancel.load(Ordering::Relaxed) {
        let step = remaining.min(CANCEL_CHECK);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
}
