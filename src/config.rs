use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SchedulerError};

/// Configuration for the simulated job execution.
///
/// Jobs carry no executable payload, so each attempt sleeps for a random
/// duration and fails with a fixed probability.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Shortest simulated run time
    pub min_duration_ms: u64,
    /// Longest simulated run time. Values above the job timeout produce timeouts.
    pub max_duration_ms: u64,
    /// Probability in [0, 1] that a completed attempt is reported as failed
    pub failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 1_000,
            max_duration_ms: 6_000,
            failure_rate: 0.1,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_duration_ms > self.max_duration_ms {
            return Err(SchedulerError::InvalidInput(format!(
                "min duration {}ms exceeds max duration {}ms",
                self.min_duration_ms, self.max_duration_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(SchedulerError::InvalidInput(format!(
                "failure rate {} is outside [0, 1]",
                self.failure_rate
            )));
        }
        Ok(())
    }
}

/// Scheduling parameters: worker count, queue size, timing and retry cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Capacity of the work queue between dispatcher and workers
    pub queue_capacity: usize,
    pub dispatch_interval_ms: u64,
    /// Wall-clock limit for a single execution attempt
    pub job_timeout_ms: u64,
    /// A job fails for good once its retries exceed this
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 64,
            dispatch_interval_ms: 3_000,
            job_timeout_ms: 5_000,
            max_retries: 3,
        }
    }
}

impl SchedulerConfig {
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_dispatch_interval_ms(mut self, interval_ms: u64) -> Self {
        self.dispatch_interval_ms = interval_ms;
        self
    }

    pub fn with_job_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.job_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SchedulerError::InvalidInput(
                "at least one worker is required".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SchedulerError::InvalidInput(
                "queue capacity must be positive".to_string(),
            ));
        }
        if self.dispatch_interval_ms == 0 {
            return Err(SchedulerError::InvalidInput(
                "dispatch interval must be positive".to_string(),
            ));
        }
        if self.job_timeout_ms == 0 {
            return Err(SchedulerError::InvalidInput(
                "job timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Snapshot file holding the job collection
    pub data_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub scheduler: SchedulerConfig,
    pub simulation: SimulationConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/jobs.json"),
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "0.0.0.0:8080"
                .parse()
                .expect("default listen address is valid"),
            scheduler: SchedulerConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn new(data_path: impl Into<PathBuf>, listen_addr: SocketAddr) -> Self {
        Self {
            data_path: data_path.into(),
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.simulation.validate()
    }
}
