use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

pub type JobId = u64;

/// Most urgent priority.
pub const MIN_PRIORITY: u8 = 1;
/// Least urgent priority.
pub const MAX_PRIORITY: u8 = 5;
/// Priority assigned when the requested one is out of range.
pub const DEFAULT_PRIORITY: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Enqueued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Enqueued,
        JobStatus::Running,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    /// Terminal states are never dispatched again by the scheduler.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Enqueued => write!(f, "enqueued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "enqueued" => Ok(JobStatus::Enqueued),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(SchedulerError::InvalidInput(format!(
                "unknown job status '{}'",
                other
            ))),
        }
    }
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 1 = most urgent, 5 = least urgent
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub retries: u32,
}

impl Job {
    pub fn new(id: JobId, title: String, description: String, priority: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            description,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            priority: Self::clamp_priority(priority),
            retries: 0,
        }
    }

    /// Out-of-range priorities fall back to [`DEFAULT_PRIORITY`] rather than
    /// the nearest bound.
    pub fn clamp_priority(priority: i64) -> u8 {
        if (MIN_PRIORITY as i64..=MAX_PRIORITY as i64).contains(&priority) {
            priority as u8
        } else {
            DEFAULT_PRIORITY
        }
    }

    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Record a failed or timed-out attempt. The job goes back to `queued`
    /// until `retries` exceeds `max_retries`, after which it is `failed` for good.
    pub fn record_failure(&mut self, max_retries: u32) -> JobStatus {
        self.retries += 1;
        let next = if self.retries > max_retries {
            JobStatus::Failed
        } else {
            JobStatus::Queued
        };
        self.set_status(next);
        next
    }
}
