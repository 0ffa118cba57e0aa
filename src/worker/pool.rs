use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::scheduler::{Job, JobId, JobRegistry, JobStatus};
use crate::worker::executor::{ExecutionOutcome, ExecutionPolicy};

/// How many times a worker tries to persist a status transition before
/// handing the job to the registry's stranded list.
const PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_BACKOFF: Duration = Duration::from_millis(100);

/// Fixed-size set of workers consuming the work queue.
///
/// All workers share one receiver; whichever worker holds the receiver lock
/// takes the next job ID. A job is only executed by the worker that wins the
/// `enqueued -> running` transition.
pub struct WorkerPool {
    registry: Arc<JobRegistry>,
    queue: Mutex<mpsc::Receiver<JobId>>,
    policy: Arc<dyn ExecutionPolicy>,
    workers: usize,
    job_timeout: Duration,
    max_retries: u32,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        registry: Arc<JobRegistry>,
        queue: mpsc::Receiver<JobId>,
        policy: Arc<dyn ExecutionPolicy>,
        config: &SchedulerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            queue: Mutex::new(queue),
            policy,
            workers: config.workers,
            job_timeout: config.job_timeout(),
            max_retries: config.max_retries,
            shutdown,
        }
    }

    /// Spawn the workers. Each handle resolves once its worker has observed
    /// shutdown and finished any job it was executing.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let pool = Arc::new(self);
        (0..pool.workers)
            .map(|worker_id| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.worker_loop(worker_id).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize) {
        tracing::debug!(worker_id, "Worker started");

        while let Some(job_id) = self.next_job().await {
            self.execute_job(worker_id, job_id).await;
        }

        tracing::debug!(worker_id, "Worker stopped");
    }

    /// Wait for the next job ID. Returns `None` on shutdown or once the
    /// dispatcher side of the queue is gone.
    async fn next_job(&self) -> Option<JobId> {
        let mut queue = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return None,
            guard = self.queue.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            job_id = queue.recv() => job_id,
        }
    }

    /// Run one attempt of `job_id` and persist its outcome.
    ///
    /// Returns the settled job, or `None` if the job was not `enqueued` when
    /// picked up, was changed by someone else while executing, or a
    /// transition could not be persisted. In the last case the job is marked
    /// stranded so a later dispatch cycle re-queues it.
    pub async fn execute_job(&self, worker_id: usize, job_id: JobId) -> Option<Job> {
        let job = match self
            .transition_with_retry(worker_id, job_id, JobStatus::Enqueued, |job| {
                job.set_status(JobStatus::Running)
            })
            .await
        {
            Ok(Some(job)) => job,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(worker_id, job_id, error = %e, "Failed to mark job running");
                if matches!(e, SchedulerError::Persistence(_)) {
                    self.registry.mark_stranded(job_id, JobStatus::Enqueued);
                }
                return None;
            }
        };

        tracing::info!(
            worker_id,
            job_id,
            title = %job.title,
            attempt = job.retries + 1,
            "Executing job"
        );

        let outcome = match tokio::time::timeout(self.job_timeout, self.policy.execute(&job)).await
        {
            Ok(outcome) => outcome,
            Err(_) => ExecutionOutcome::TimedOut,
        };

        self.settle(worker_id, job_id, outcome).await
    }

    async fn settle(&self, worker_id: usize, job_id: JobId, outcome: ExecutionOutcome) -> Option<Job> {
        let max_retries = self.max_retries;

        let result = self
            .transition_with_retry(worker_id, job_id, JobStatus::Running, |job| match &outcome {
                ExecutionOutcome::Completed => job.set_status(JobStatus::Done),
                ExecutionOutcome::Failed { .. } | ExecutionOutcome::TimedOut => {
                    job.record_failure(max_retries);
                }
            })
            .await;

        match result {
            Ok(Some(job)) => {
                match job.status {
                    JobStatus::Done => {
                        tracing::info!(worker_id, job_id, "Job completed");
                    }
                    JobStatus::Queued => tracing::warn!(
                        worker_id,
                        job_id,
                        retries = job.retries,
                        outcome = %outcome,
                        "Job attempt failed, re-queued"
                    ),
                    _ => tracing::error!(
                        worker_id,
                        job_id,
                        retries = job.retries,
                        outcome = %outcome,
                        "Job failed permanently"
                    ),
                }
                Some(job)
            }
            Ok(None) => {
                tracing::warn!(
                    worker_id,
                    job_id,
                    outcome = %outcome,
                    "Job status changed while executing, discarding outcome"
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    worker_id,
                    job_id,
                    outcome = %outcome,
                    error = %e,
                    "Giving up on persisting job outcome"
                );
                if matches!(e, SchedulerError::Persistence(_)) {
                    self.registry.mark_stranded(job_id, JobStatus::Running);
                }
                None
            }
        }
    }

    /// [`JobRegistry::transition`], retrying persistence failures with a
    /// linear backoff. Other errors are returned at once.
    async fn transition_with_retry<F>(
        &self,
        worker_id: usize,
        job_id: JobId,
        expected: JobStatus,
        mutate: F,
    ) -> Result<Option<Job>>
    where
        F: Fn(&mut Job),
    {
        let mut attempt = 1;
        loop {
            match self.registry.transition(job_id, expected, &mutate) {
                Err(SchedulerError::Persistence(e)) if attempt < PERSIST_ATTEMPTS => {
                    tracing::warn!(
                        worker_id,
                        job_id,
                        attempt,
                        error = %e,
                        "Failed to persist job transition, retrying"
                    );
                    tokio::time::sleep(PERSIST_BACKOFF * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
