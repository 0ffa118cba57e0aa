use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::SimulationConfig;
use crate::scheduler::Job;

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    Failed { reason: String },
    /// The attempt outlived the job timeout. Produced by the worker, not by policies.
    TimedOut,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed)
    }
}

impl std::fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionOutcome::Completed => write!(f, "completed"),
            ExecutionOutcome::Failed { reason } => write!(f, "failed: {}", reason),
            ExecutionOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Decides how long an attempt takes and whether it succeeds.
///
/// Workers race `execute` against the job timeout and drop the future when
/// the timeout wins, so implementations must be cancel-safe.
#[async_trait]
pub trait ExecutionPolicy: Send + Sync + 'static {
    async fn execute(&self, job: &Job) -> ExecutionOutcome;
}

/// Sleeps a random duration and fails with a configured probability.
#[derive(Debug, Clone)]
pub struct SimulatedExecution {
    config: SimulationConfig,
}

impl SimulatedExecution {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ExecutionPolicy for SimulatedExecution {
    async fn execute(&self, job: &Job) -> ExecutionOutcome {
        let (duration, fails) = {
            let mut rng = rand::thread_rng();
            let lo = self.config.min_duration_ms.min(self.config.max_duration_ms);
            let hi = self.config.min_duration_ms.max(self.config.max_duration_ms);
            let duration_ms = rng.gen_range(lo..=hi);
            let rate = if self.config.failure_rate.is_nan() {
                0.0
            } else {
                self.config.failure_rate.clamp(0.0, 1.0)
            };
            let fails = rng.gen_bool(rate);
            (Duration::from_millis(duration_ms), fails)
        };

        tracing::debug!(
            job_id = job.id,
            duration_ms = duration.as_millis() as u64,
            "Simulating job execution"
        );
        tokio::time::sleep(duration).await;

        if fails {
            ExecutionOutcome::Failed {
                reason: "simulated failure".to_string(),
            }
        } else {
            ExecutionOutcome::Completed
        }
    }
}

/// Always takes `duration` and returns `outcome`.
#[derive(Debug, Clone)]
pub struct FixedExecution {
    duration: Duration,
    outcome: ExecutionOutcome,
}

impl FixedExecution {
    pub fn new(duration: Duration, outcome: ExecutionOutcome) -> Self {
        Self { duration, outcome }
    }

    pub fn succeeding(duration: Duration) -> Self {
        Self::new(duration, ExecutionOutcome::Completed)
    }

    pub fn failing(duration: Duration, reason: impl Into<String>) -> Self {
        Self::new(
            duration,
            ExecutionOutcome::Failed {
                reason: reason.into(),
            },
        )
    }
}

#[async_trait]
impl ExecutionPolicy for FixedExecution {
    async fn execute(&self, _job: &Job) -> ExecutionOutcome {
        tokio::time::sleep(self.duration).await;
        self.outcome.clone()
    }
}
