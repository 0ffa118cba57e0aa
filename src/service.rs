use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{SchedulerConfig, ServiceConfig};
use crate::error::{Result, SchedulerError};
use crate::scheduler::{Dispatcher, Job, JobId, JobRegistry, JobStats, JobStatus};
use crate::store::{FileJobStore, JobStore};
use crate::worker::{ExecutionPolicy, SimulatedExecution, WorkerPool};

enum Lifecycle {
    Idle,
    Running {
        shutdown: CancellationToken,
        tasks: Vec<JoinHandle<()>>,
    },
    Stopped,
}

/// Entry point of the scheduler: owns the registry, runs the background
/// tasks, and exposes the operations the HTTP layer calls.
pub struct JobService {
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    policy: Arc<dyn ExecutionPolicy>,
    lifecycle: Mutex<Lifecycle>,
}

impl JobService {
    /// Open the service on the configured snapshot file with simulated execution.
    pub fn open(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(FileJobStore::new(&config.data_path));
        let policy = Arc::new(SimulatedExecution::new(config.simulation.clone()));
        Self::with_store(config.scheduler.clone(), store, policy)
    }

    pub fn with_store(
        config: SchedulerConfig,
        store: Arc<dyn JobStore>,
        policy: Arc<dyn ExecutionPolicy>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(JobRegistry::open(store)?);
        Ok(Self {
            config,
            registry,
            policy,
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Spawn the dispatcher and the worker pool. Must be called from within a
    /// tokio runtime. A stopped service can be started again.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*lifecycle, Lifecycle::Running { .. }) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let shutdown = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);

        let dispatcher = Dispatcher::new(
            self.registry.clone(),
            tx,
            self.config.dispatch_interval(),
            shutdown.clone(),
        );
        let pool = WorkerPool::new(
            self.registry.clone(),
            rx,
            self.policy.clone(),
            &self.config,
            shutdown.clone(),
        );

        let mut tasks = pool.spawn();
        tasks.push(tokio::spawn(dispatcher.run()));

        tracing::info!(
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            job_timeout_ms = self.config.job_timeout_ms,
            max_retries = self.config.max_retries,
            "Scheduler started"
        );

        *lifecycle = Lifecycle::Running { shutdown, tasks };
        Ok(())
    }

    /// Signal the background tasks to stop and wait for them.
    ///
    /// Jobs already executing run to completion or timeout and are settled
    /// before this returns; jobs still waiting in the queue go back to
    /// `queued`. Stopping an already stopped service does nothing.
    pub async fn stop(&self) -> Result<()> {
        let (shutdown, tasks) = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { shutdown, tasks } => (shutdown, tasks),
                Lifecycle::Stopped => return Ok(()),
                Lifecycle::Idle => {
                    *lifecycle = Lifecycle::Idle;
                    return Err(SchedulerError::NotRunning);
                }
            }
        };

        tracing::info!("Stopping scheduler, draining in-flight jobs");
        shutdown.cancel();

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Scheduler task ended abnormally");
            }
        }

        let recovered = self.registry.recover_stranded()?;
        let requeued = self.registry.requeue_stranded()?;
        tracing::info!(requeued = requeued + recovered, "Scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner),
            Lifecycle::Running { .. }
        )
    }

    /// Create a job. Out-of-range priorities are replaced with the default;
    /// a blank title is rejected.
    pub fn create_job(&self, title: String, description: String, priority: i64) -> Result<Job> {
        if title.trim().is_empty() {
            return Err(SchedulerError::InvalidInput(
                "title must not be empty".to_string(),
            ));
        }
        self.registry.create(title, description, priority)
    }

    pub fn get_job(&self, id: JobId) -> Result<Job> {
        self.registry.get(id)
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.registry.list()
    }

    pub fn update_job_status(&self, id: JobId, status: JobStatus) -> Result<Job> {
        self.registry.update_status(id, status)
    }

    pub fn stats(&self) -> JobStats {
        self.registry.stats()
    }
}
